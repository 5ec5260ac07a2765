//! Parser end-to-end tests: automatic semicolon insertion, operator
//! precedence and associativity, statement forms, extents and error
//! reporting.

use marten_parser::{
    parse, Expression, ExpressionKind, Literal, SourceFile, Statement, StatementKind, TokenKind,
};

fn parse_source(source: &str) -> Statement {
    parse(&SourceFile::new("test.js", source)).expect("parse failed")
}

fn program_statements(source: &str) -> Vec<Statement> {
    match parse_source(source).kind {
        StatementKind::Block(statements) => statements,
        other => panic!("program was not a block: {other:?}"),
    }
}

fn expression_statement(statement: &Statement) -> &Expression {
    match &statement.kind {
        StatementKind::Expression(expression) => expression,
        other => panic!("expected expression statement, got {other:?}"),
    }
}

fn identifier_name(expression: &Expression) -> &str {
    match &expression.kind {
        ExpressionKind::Identifier(name) => name,
        other => panic!("expected identifier, got {other:?}"),
    }
}

fn number_value(expression: &Expression) -> f64 {
    match &expression.kind {
        ExpressionKind::Literal(Literal::Number(n)) => *n,
        other => panic!("expected number literal, got {other:?}"),
    }
}

#[test]
fn top_level_extent_covers_whole_source() {
    for source in ["var x = 1;", "a + b", "  // nothing\n", ""] {
        let program = parse_source(source);
        assert_eq!(program.extent.start, 0, "in {source:?}");
        assert_eq!(program.extent.end, source.chars().count() as u32, "in {source:?}");
        assert!(matches!(program.kind, StatementKind::Block(_)));
    }
}

#[test]
fn empty_and_whitespace_programs_parse() {
    assert!(program_statements("").is_empty());
    assert!(program_statements("  \n\t ").is_empty());
    assert!(program_statements("/* just a comment */").is_empty());
}

// ---- Automatic semicolon insertion ----------------------------------------

#[test]
fn asi_splits_return_before_line_break() {
    let statements = program_statements("return\n1");
    assert_eq!(statements.len(), 2);
    assert!(matches!(statements[0].kind, StatementKind::Return(None)));
    assert_eq!(number_value(expression_statement(&statements[1])), 1.0);
}

#[test]
fn return_keeps_expression_on_same_line() {
    let statements = program_statements("return 1");
    assert_eq!(statements.len(), 1);
    match &statements[0].kind {
        StatementKind::Return(Some(expression)) => {
            assert_eq!(number_value(expression), 1.0);
        }
        other => panic!("expected return with expression, got {other:?}"),
    }
}

#[test]
fn asi_splits_prefix_increment_after_line_break() {
    let statements = program_statements("a\n++b");
    assert_eq!(statements.len(), 2);
    assert_eq!(identifier_name(expression_statement(&statements[0])), "a");
    match &expression_statement(&statements[1]).kind {
        ExpressionKind::Prefix { op, operand } => {
            assert_eq!(*op, TokenKind::PlusPlus);
            assert_eq!(identifier_name(operand), "b");
        }
        other => panic!("expected prefix increment, got {other:?}"),
    }
}

#[test]
fn postfix_binds_before_line_break() {
    let statements = program_statements("a++\nb");
    assert_eq!(statements.len(), 2);
    match &expression_statement(&statements[0]).kind {
        ExpressionKind::Postfix { op, operand } => {
            assert_eq!(*op, TokenKind::PlusPlus);
            assert_eq!(identifier_name(operand), "a");
        }
        other => panic!("expected postfix increment, got {other:?}"),
    }
    assert_eq!(identifier_name(expression_statement(&statements[1])), "b");
}

#[test]
fn asi_before_closing_brace_and_at_eof() {
    let statements = program_statements("{ a() }");
    match &statements[0].kind {
        StatementKind::Block(inner) => {
            assert_eq!(inner.len(), 1);
            assert!(matches!(
                expression_statement(&inner[0]).kind,
                ExpressionKind::Call { .. }
            ));
        }
        other => panic!("expected block, got {other:?}"),
    }
    // End of input also inserts.
    let statements = program_statements("a");
    assert_eq!(identifier_name(expression_statement(&statements[0])), "a");
}

#[test]
fn missing_semicolon_without_line_break_is_an_error() {
    let err = parse(&SourceFile::new("test.js", "a b")).unwrap_err();
    assert!(err.message.contains("Semicolon"), "got: {}", err.message);
    // The extent points at the offending token.
    assert_eq!(err.extent.start, 2);
    assert_eq!(err.extent.end, 3);
}

#[test]
fn line_break_inserts_between_statements() {
    let statements = program_statements("a = 1\nb = 2");
    assert_eq!(statements.len(), 2);
}

// ---- Operator precedence and associativity --------------------------------

#[test]
fn multiplication_binds_tighter_than_addition_and_equality() {
    // 1+2*3==7 parses as ((1+(2*3))==7)
    let statements = program_statements("1+2*3==7");
    match &expression_statement(&statements[0]).kind {
        ExpressionKind::Binary { op, lhs, rhs } => {
            assert_eq!(*op, TokenKind::EqEq);
            assert_eq!(number_value(rhs), 7.0);
            match &lhs.kind {
                ExpressionKind::Binary { op, lhs, rhs } => {
                    assert_eq!(*op, TokenKind::Plus);
                    assert_eq!(number_value(lhs), 1.0);
                    match &rhs.kind {
                        ExpressionKind::Binary { op, lhs, rhs } => {
                            assert_eq!(*op, TokenKind::Multiply);
                            assert_eq!(number_value(lhs), 2.0);
                            assert_eq!(number_value(rhs), 3.0);
                        }
                        other => panic!("expected multiplication, got {other:?}"),
                    }
                }
                other => panic!("expected addition, got {other:?}"),
            }
        }
        other => panic!("expected equality, got {other:?}"),
    }
}

#[test]
fn assignment_is_right_associative() {
    // a=b=c parses as a=(b=c)
    let statements = program_statements("a=b=c");
    match &expression_statement(&statements[0]).kind {
        ExpressionKind::Binary { op, lhs, rhs } => {
            assert_eq!(*op, TokenKind::Assign);
            assert_eq!(identifier_name(lhs), "a");
            match &rhs.kind {
                ExpressionKind::Binary { op, lhs, rhs } => {
                    assert_eq!(*op, TokenKind::Assign);
                    assert_eq!(identifier_name(lhs), "b");
                    assert_eq!(identifier_name(rhs), "c");
                }
                other => panic!("expected nested assignment, got {other:?}"),
            }
        }
        other => panic!("expected assignment, got {other:?}"),
    }
}

#[test]
fn conditional_nests_to_the_right() {
    // a?b:c?d:e parses as a?b:(c?d:e)
    let statements = program_statements("a?b:c?d:e");
    match &expression_statement(&statements[0]).kind {
        ExpressionKind::Conditional {
            condition,
            consequent,
            alternate,
        } => {
            assert_eq!(identifier_name(condition), "a");
            assert_eq!(identifier_name(consequent), "b");
            match &alternate.kind {
                ExpressionKind::Conditional {
                    condition,
                    consequent,
                    alternate,
                } => {
                    assert_eq!(identifier_name(condition), "c");
                    assert_eq!(identifier_name(consequent), "d");
                    assert_eq!(identifier_name(alternate), "e");
                }
                other => panic!("expected nested conditional, got {other:?}"),
            }
        }
        other => panic!("expected conditional, got {other:?}"),
    }
}

#[test]
fn comma_operator_binds_loosest() {
    let statements = program_statements("a = 1, b");
    match &expression_statement(&statements[0]).kind {
        ExpressionKind::Binary { op, lhs, .. } => {
            assert_eq!(*op, TokenKind::Comma);
            assert!(matches!(
                lhs.kind,
                ExpressionKind::Binary {
                    op: TokenKind::Assign,
                    ..
                }
            ));
        }
        other => panic!("expected comma expression, got {other:?}"),
    }
}

#[test]
fn compound_assignment_and_shifts() {
    let statements = program_statements("a >>>= b >>> 2");
    match &expression_statement(&statements[0]).kind {
        ExpressionKind::Binary { op, rhs, .. } => {
            assert_eq!(*op, TokenKind::URShiftAssign);
            assert!(matches!(
                rhs.kind,
                ExpressionKind::Binary {
                    op: TokenKind::URShift,
                    ..
                }
            ));
        }
        other => panic!("expected compound assignment, got {other:?}"),
    }
}

// ---- Member, call and new expressions -------------------------------------

#[test]
fn dot_access_desugars_to_string_literal_index() {
    let statements = program_statements("obj.prop");
    match &expression_statement(&statements[0]).kind {
        ExpressionKind::Binary { op, lhs, rhs } => {
            assert_eq!(*op, TokenKind::Dot);
            assert_eq!(identifier_name(lhs), "obj");
            match &rhs.kind {
                ExpressionKind::Literal(Literal::String(name)) => assert_eq!(name, "prop"),
                other => panic!("expected string literal, got {other:?}"),
            }
        }
        other => panic!("expected member access, got {other:?}"),
    }
}

#[test]
fn call_chains_combine_with_indexing() {
    let statements = program_statements("f(x)[0](y)");
    // Outermost node: call with argument y.
    match &expression_statement(&statements[0]).kind {
        ExpressionKind::Call { callee, arguments } => {
            assert_eq!(arguments.len(), 1);
            assert_eq!(identifier_name(&arguments[0]), "y");
            match &callee.kind {
                ExpressionKind::Binary { op, lhs, .. } => {
                    assert_eq!(*op, TokenKind::LBracket);
                    assert!(matches!(lhs.kind, ExpressionKind::Call { .. }));
                }
                other => panic!("expected indexing, got {other:?}"),
            }
        }
        other => panic!("expected call, got {other:?}"),
    }
}

#[test]
fn new_with_arguments() {
    let statements = program_statements("new Point(1, 2)");
    match &expression_statement(&statements[0]).kind {
        ExpressionKind::Prefix { op, operand } => {
            assert_eq!(*op, TokenKind::New);
            match &operand.kind {
                ExpressionKind::Call { callee, arguments } => {
                    assert_eq!(identifier_name(callee), "Point");
                    assert_eq!(arguments.len(), 2);
                }
                other => panic!("expected constructor call, got {other:?}"),
            }
        }
        other => panic!("expected new expression, got {other:?}"),
    }
}

#[test]
fn this_parses_as_identifier() {
    let statements = program_statements("this.x");
    match &expression_statement(&statements[0]).kind {
        ExpressionKind::Binary { lhs, .. } => assert_eq!(identifier_name(lhs), "this"),
        other => panic!("expected member access, got {other:?}"),
    }
}

// ---- Statement forms ------------------------------------------------------

#[test]
fn variable_declaration_list() {
    let statements = program_statements("var a, b = 2, c;");
    match &statements[0].kind {
        StatementKind::Variable(declarations) => {
            assert_eq!(declarations.len(), 3);
            assert_eq!(declarations[0].name, "a");
            assert!(declarations[0].initializer.is_none());
            assert_eq!(declarations[1].name, "b");
            assert_eq!(
                number_value(declarations[1].initializer.as_ref().unwrap()),
                2.0
            );
            assert_eq!(declarations[2].name, "c");
        }
        other => panic!("expected variable statement, got {other:?}"),
    }
}

#[test]
fn if_else_and_while() {
    let statements = program_statements("if (a) b(); else c();\nwhile (d) ;");
    match &statements[0].kind {
        StatementKind::If {
            condition,
            alternate,
            ..
        } => {
            assert_eq!(identifier_name(condition), "a");
            assert!(alternate.is_some());
        }
        other => panic!("expected if statement, got {other:?}"),
    }
    match &statements[1].kind {
        StatementKind::While { condition, body } => {
            assert_eq!(identifier_name(condition), "d");
            assert!(matches!(body.kind, StatementKind::Empty));
        }
        other => panic!("expected while statement, got {other:?}"),
    }
}

#[test]
fn three_part_for() {
    let statements = program_statements("for (var i = 0; i < 10; ++i) f(i);");
    match &statements[0].kind {
        StatementKind::For {
            init,
            condition,
            iter,
            ..
        } => {
            assert!(matches!(
                init.as_ref().unwrap().kind,
                StatementKind::Variable(_)
            ));
            assert!(condition.is_some());
            assert!(iter.is_some());
        }
        other => panic!("expected for statement, got {other:?}"),
    }
}

#[test]
fn for_with_empty_heads() {
    let statements = program_statements("for (;;) break;");
    match &statements[0].kind {
        StatementKind::For {
            init,
            condition,
            iter,
            body,
        } => {
            assert!(init.is_none());
            assert!(condition.is_none());
            assert!(iter.is_none());
            assert!(matches!(body.kind, StatementKind::Break));
        }
        other => panic!("expected for statement, got {other:?}"),
    }
}

#[test]
fn for_in_over_variable_and_expression() {
    let statements = program_statements("for (var k in o) f(k);\nfor (x in o) g(x);");
    match &statements[0].kind {
        StatementKind::ForIn { init, object, .. } => {
            match &init.kind {
                StatementKind::Variable(declarations) => {
                    assert_eq!(declarations.len(), 1);
                    assert_eq!(declarations[0].name, "k");
                }
                other => panic!("expected variable init, got {other:?}"),
            }
            assert_eq!(identifier_name(object), "o");
        }
        other => panic!("expected for-in, got {other:?}"),
    }
    assert!(matches!(statements[1].kind, StatementKind::ForIn { .. }));
}

#[test]
fn for_in_rejects_multiple_declarations() {
    let err = parse(&SourceFile::new("test.js", "for (var a, b in o) ;")).unwrap_err();
    assert_eq!(err.rule, "for-in statement");
}

#[test]
fn with_continue_break_statements() {
    let statements = program_statements("with (o) { continue; break }");
    match &statements[0].kind {
        StatementKind::With { object, body } => {
            assert_eq!(identifier_name(object), "o");
            match &body.kind {
                StatementKind::Block(inner) => {
                    assert!(matches!(inner[0].kind, StatementKind::Continue));
                    assert!(matches!(inner[1].kind, StatementKind::Break));
                }
                other => panic!("expected block, got {other:?}"),
            }
        }
        other => panic!("expected with statement, got {other:?}"),
    }
}

// ---- Function declarations ------------------------------------------------

#[test]
fn function_declaration_shape() {
    let source = "function add(a, b) { return a + b; }";
    let statements = program_statements(source);
    match &statements[0].kind {
        StatementKind::FunctionDefinition {
            name,
            params,
            body_extent,
            block,
        } => {
            assert_eq!(name, "add");
            assert_eq!(params, &vec!["a".to_string(), "b".to_string()]);
            assert!(matches!(block.kind, StatementKind::Block(_)));
            // The recorded source spans the parameter list through the
            // closing brace.
            let text = body_extent.source_text();
            assert!(text.starts_with("(a, b)"), "got {text:?}");
            assert!(text.ends_with('}'), "got {text:?}");
        }
        other => panic!("expected function definition, got {other:?}"),
    }
}

#[test]
fn functions_mix_with_statements_at_top_level() {
    let statements = program_statements("var x;\nfunction f() {}\nx = f;");
    assert_eq!(statements.len(), 3);
    assert!(matches!(statements[0].kind, StatementKind::Variable(_)));
    assert!(matches!(
        statements[1].kind,
        StatementKind::FunctionDefinition { .. }
    ));
    assert!(matches!(statements[2].kind, StatementKind::Expression(_)));
}

// ---- Literals and errors --------------------------------------------------

#[test]
fn literal_kinds() {
    let statements = program_statements("null; true; false; 1.5; 'str'");
    let expected = [
        Literal::Null,
        Literal::Boolean(true),
        Literal::Boolean(false),
        Literal::Number(1.5),
        Literal::String("str".to_string()),
    ];
    for (statement, want) in statements.iter().zip(&expected) {
        match &expression_statement(statement).kind {
            ExpressionKind::Literal(literal) => assert_eq!(literal, want),
            other => panic!("expected literal, got {other:?}"),
        }
    }
}

#[test]
fn unexpected_tokens_report_rule_names() {
    let err = parse(&SourceFile::new("test.js", "var 1;")).unwrap_err();
    assert_eq!(err.rule, "variable declaration");

    let err = parse(&SourceFile::new("test.js", "if (")).unwrap_err();
    assert_eq!(err.rule, "primary expression");

    let err = parse(&SourceFile::new("test.js", "function () {}")).unwrap_err();
    assert_eq!(err.rule, "function declaration");

    let err = parse(&SourceFile::new("test.js", "?")).unwrap_err();
    assert_eq!(err.rule, "primary expression");
}

#[test]
fn errors_display_position() {
    let err = parse(&SourceFile::new("test.js", "var\n  1;")).unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.starts_with("SyntaxError:"), "got {rendered}");
    assert!(rendered.contains("test.js:2:3"), "got {rendered}");
}
