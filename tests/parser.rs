use evoscript::{
    ast::{ExprKind, StmtKind},
    diagnostics::{render_span, DiagnosticKind},
    interner::Interner,
    lexer::{Keyword, Lexer, TokenKind},
    parser::parse_program,
};

fn parse(source: &str) -> evoscript::ast::Program {
    let mut interner = Interner::new();
    parse_program(source, &mut interner).expect("lexing should succeed")
}

fn first_error(source: &str) -> String {
    let program = parse(source);
    assert!(program.is_error(), "expected parse error for {source:?}");
    program.errors()[0].message.clone()
}

#[test]
fn block_display_reflects_precedence() {
    let program = parse("{ let x = 1 + 2 * 3; }");
    assert!(!program.is_error());
    assert_eq!(program.to_string(), "{ let x = (1 + (2 * 3)); }");
}

#[test]
fn assignment_is_right_associative() {
    let program = parse("a = b += 3;");
    assert_eq!(program.to_string(), "(a = (b += 3));");
}

#[test]
fn logical_and_binds_tighter_than_or() {
    let program = parse("a || b && c == 1;");
    assert_eq!(program.to_string(), "(a || (b && (c == 1)));");
}

#[test]
fn postfix_chains() {
    let program = parse("sys.write(a[1], b.c)++;");
    assert_eq!(program.to_string(), "(sys.write(a[1], b.c)++);");
    let program = parse("new Foo.Bar(1).baz;");
    assert_eq!(program.to_string(), "new Foo.Bar(1).baz;");
}

#[test]
fn statements_round_trip() {
    let source = "if ((x < 1)) y; else { z; }";
    assert_eq!(parse(source).to_string(), "if ((x < 1)) y; else { z; }");

    let program = parse("for (let i = 0; i < 3; i++) {} while (1) break;");
    assert_eq!(
        program.to_string(),
        "for (let i = 0; (i < 3); (i++)) {} while (1) break;"
    );

    let program = parse("switch (x) { case -1: y; default: z; }");
    assert_eq!(program.to_string(), "switch (x) { case -1: y; default: z; }");

    let program = parse("try { throw 1; } catch (e) { e; }");
    assert_eq!(program.to_string(), "try { throw 1; } catch (e) { e; }");
}

#[test]
fn function_declarations_and_expressions() {
    let program = parse("function add(a, b) { return a + b; } let f = function() {};");
    assert_eq!(program.statements.len(), 2);
    match &program.statements[0].kind {
        StmtKind::Function(decl) => {
            assert_eq!(decl.name.as_ref().map(|name| name.as_str()), Some("add"));
            assert_eq!(decl.params.len(), 2);
        }
        other => panic!("expected function declaration, found {other:?}"),
    }
    match &program.statements[1].kind {
        StmtKind::Declaration {
            initializer: Some(init),
            ..
        } => assert!(matches!(&init.kind, ExprKind::Function(decl) if decl.name.is_none())),
        other => panic!("expected declaration, found {other:?}"),
    }
}

#[test]
fn blocks_need_scope_only_when_declaring() {
    let program = parse("{ let x = 1; } { x = 1; }");
    let scopes: Vec<bool> = program
        .statements
        .iter()
        .map(|statement| match &statement.kind {
            StmtKind::Block(block) => block.needs_scope,
            other => panic!("expected block, found {other:?}"),
        })
        .collect();
    assert_eq!(scopes, vec![true, false]);
}

#[test]
fn errors_are_embedded_in_program() {
    assert_eq!(first_error("let x = (1 + 2;"), "Unmatched '('");
    assert_eq!(first_error("1 2;"), "Expected ';' after statement");
    assert_eq!(first_error("{ x;"), "Unclosed block statement");
    assert_eq!(first_error("const x;"), "Expected initializer for 'const' declaration");
    assert_eq!(first_error("let x + 1;"), "Invalid operator for initializer, expected '='");
    assert_eq!(first_error("a.;"), "Expected name in member expression");
    assert_eq!(first_error("x = @;"), "Unexpected character '@'");
}

#[test]
fn error_diagnostics_carry_positions() {
    let source = "let a = 1;\nlet b = (2;";
    let program = parse(source);
    let diagnostics = program.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    let diagnostic = &diagnostics[0];
    assert_eq!(diagnostic.kind, DiagnosticKind::Parser);
    let span = diagnostic.span.expect("parse errors have spans");
    assert_eq!(span.start.line, 1);
    assert_eq!(span.start.column, 10);
    assert_eq!(render_span(source, span), " | let b = (2;\n |           ^\n");
}

#[test]
fn lexer_recognizes_operators_and_literals() {
    let tokens = Lexer::new("let a <= 0x1F; // trailing\nb += 'it''s';")
        .tokenize()
        .expect("lexing should succeed");
    let kinds: Vec<TokenKind> = tokens.iter().map(|token| token.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Keyword(Keyword::Let),
            TokenKind::Identifier,
            TokenKind::LessEqual,
            TokenKind::Number,
            TokenKind::Semicolon,
            TokenKind::Identifier,
            TokenKind::PlusAssign,
            TokenKind::String,
            TokenKind::String,
            TokenKind::Semicolon,
            TokenKind::Eof,
        ]
    );
    assert_eq!(tokens[3].lexeme, "0x1F");
    assert_eq!(tokens[7].lexeme, "it");
    assert_eq!(tokens[5].span.start.line, 1);
}

#[test]
fn lexer_keeps_invalid_characters() {
    let tokens = Lexer::new("a & b").tokenize().expect("lexing should succeed");
    assert_eq!(tokens[1].kind, TokenKind::Invalid);
    assert_eq!(tokens.len(), 4);
}

#[test]
fn unterminated_string_is_fatal() {
    let error = Lexer::new("let s = \"oops;")
        .tokenize()
        .expect_err("unterminated string should fail");
    assert_eq!(error.kind, DiagnosticKind::Lexer);
    assert_eq!(error.message, "Unterminated string literal");
}
