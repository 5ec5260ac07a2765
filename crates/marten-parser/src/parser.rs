//! Recursive-descent parser.
//!
//! Grammar productions map one-to-one onto methods; binary operators are
//! handled by precedence climbing (strict `>` look-ahead comparison), and
//! unary/update operators are special-cased. Semicolons are inserted
//! automatically after a skipped line terminator, before `}`, and at end of
//! input; a line terminator also suppresses postfix `++`/`--` and the
//! `return` expression.
//!
//! Node extents come from two stacks of scope start offsets (one for
//! expressions, one for statements): a scope records the offset of the
//! token it opened at, and every node produced inside it spans from there
//! to the start of the current token. The stacks are balanced on every
//! path, including errors, and checked empty when the program production
//! finishes.

use tracing::trace;

use crate::ast::{
    Declaration, Expression, ExpressionKind, Literal, Statement, StatementKind,
};
use crate::error::ParseError;
use crate::lexer::Lexer;
use crate::source::{SourceExtent, SourceFile};
use crate::token::{
    is_right_to_left, operator_precedence, Token, TokenKind, ASSIGNMENT_PRECEDENCE,
    COMMA_PRECEDENCE,
};

type Result<T> = std::result::Result<T, ParseError>;

/// Parse a source file into its program block.
///
/// The returned statement is a block spanning the whole input, holding the
/// top-level statements and function declarations.
pub fn parse(file: &SourceFile) -> Result<Statement> {
    Parser::new(file.clone())?.parse_program()
}

struct Parser {
    file: SourceFile,
    lexer: Lexer,
    token_start: u32,
    expression_starts: Vec<u32>,
    statement_starts: Vec<u32>,
    line_break_skipped: bool,
}

impl Parser {
    fn new(file: SourceFile) -> Result<Self> {
        let lexer = Lexer::new(file.clone())?;
        let mut parser = Self {
            file,
            lexer,
            token_start: 0,
            expression_starts: Vec::new(),
            statement_starts: Vec::new(),
            line_break_skipped: false,
        };
        parser.skip_whitespace()?;
        Ok(parser)
    }

    fn parse_program(&mut self) -> Result<Statement> {
        let mut statements = Vec::new();
        while self.current_kind() != TokenKind::Eof {
            statements.push(self.parse_statement_or_function_declaration()?);
        }
        debug_assert!(
            self.expression_starts.is_empty() && self.statement_starts.is_empty(),
            "unbalanced extent scopes after a successful parse"
        );
        let extent = SourceExtent::new(self.file.clone(), 0, self.lexer.text_position());
        Ok(Statement {
            extent,
            kind: StatementKind::Block(statements),
        })
    }

    // ---- Token plumbing ---------------------------------------------------

    fn current_kind(&self) -> TokenKind {
        self.lexer.current_token().kind
    }

    fn skip_whitespace(&mut self) -> Result<()> {
        loop {
            match self.current_kind() {
                TokenKind::Whitespace => {}
                TokenKind::LineTerminator => self.line_break_skipped = true,
                _ => return Ok(()),
            }
            self.token_start = self.lexer.text_position();
            self.lexer.next_token()?;
        }
    }

    fn get_token(&mut self) -> Result<Token> {
        let token = self.lexer.current_token().clone();
        self.lexer.next_token()?;
        self.line_break_skipped = false;
        self.token_start = token.end;
        self.skip_whitespace()?;
        Ok(token)
    }

    fn accept(&mut self, kind: TokenKind) -> Result<Option<Token>> {
        if self.current_kind() == kind {
            Ok(Some(self.get_token()?))
        } else {
            Ok(None)
        }
    }

    fn expect(&mut self, kind: TokenKind, rule: &'static str) -> Result<Token> {
        match self.accept(kind)? {
            Some(token) => Ok(token),
            None => Err(self.syntax_error(
                rule,
                format!("expected {:?}, found {:?}", kind, self.current_kind()),
            )),
        }
    }

    /// Require a statement terminator, inserting one when a line break was
    /// skipped, the next token is `}`, or the input ended.
    fn expect_semicolon_allow_insertion(&mut self, rule: &'static str) -> Result<()> {
        if !self.line_break_skipped
            && self.current_kind() != TokenKind::RBrace
            && self.current_kind() != TokenKind::Eof
        {
            self.expect(TokenKind::Semicolon, rule)?;
        } else {
            self.accept(TokenKind::Semicolon)?;
        }
        Ok(())
    }

    fn syntax_error(&self, rule: &'static str, message: String) -> ParseError {
        let current = self.lexer.current_token();
        ParseError {
            extent: SourceExtent::new(self.file.clone(), current.start, current.end),
            rule,
            message,
        }
    }

    // ---- Extent scopes ----------------------------------------------------

    fn with_expression_scope<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.expression_starts.push(self.token_start);
        let result = f(self);
        self.expression_starts.pop();
        result
    }

    fn with_statement_scope<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.statement_starts.push(self.token_start);
        let result = f(self);
        self.statement_starts.pop();
        result
    }

    fn finish_expression(&mut self, kind: ExpressionKind) -> Expression {
        debug_assert!(!self.expression_starts.is_empty(), "no open expression scope");
        let start = self
            .expression_starts
            .last()
            .copied()
            .unwrap_or(self.token_start);
        let extent = SourceExtent::new(self.file.clone(), start, self.token_start);
        trace!(extent = %extent, "produced expression");
        Expression { extent, kind }
    }

    fn finish_statement(&mut self, kind: StatementKind) -> Statement {
        debug_assert!(!self.statement_starts.is_empty(), "no open statement scope");
        let start = self
            .statement_starts
            .last()
            .copied()
            .unwrap_or(self.token_start);
        let extent = SourceExtent::new(self.file.clone(), start, self.token_start);
        trace!(extent = %extent, "produced statement");
        Statement { extent, kind }
    }

    // ---- Expressions ------------------------------------------------------

    fn parse_primary_expression(&mut self) -> Result<Expression> {
        // PrimaryExpression :
        //  this
        //  Identifier
        //  Literal
        //  ( Expression )
        if let Some(identifier) = self.accept(TokenKind::Identifier)? {
            let name = identifier.text().to_owned();
            return Ok(self.finish_expression(ExpressionKind::Identifier(name)));
        }
        if self.accept(TokenKind::This)?.is_some() {
            return Ok(self.finish_expression(ExpressionKind::Identifier("this".to_owned())));
        }
        if self.accept(TokenKind::LParen)?.is_some() {
            let expression = self.parse_expression()?;
            self.expect(TokenKind::RParen, "parenthesized expression")?;
            return Ok(expression);
        }
        if self.current_kind().is_literal() {
            let token = self.get_token()?;
            let literal = match token.kind {
                TokenKind::Null => Literal::Null,
                TokenKind::True => Literal::Boolean(true),
                TokenKind::False => Literal::Boolean(false),
                TokenKind::NumberLiteral => Literal::Number(token.number()),
                TokenKind::StringLiteral => Literal::String(token.text().to_owned()),
                _ => unreachable!("is_literal covered the kinds above"),
            };
            return Ok(self.finish_expression(ExpressionKind::Literal(literal)));
        }
        Err(self.syntax_error(
            "primary expression",
            format!("unexpected token {:?}", self.current_kind()),
        ))
    }

    fn parse_postfix_expression(&mut self) -> Result<Expression> {
        let lhs = self.parse_left_hand_side_expression()?;
        // No line break may separate the operand from a postfix operator.
        if self.line_break_skipped {
            return Ok(lhs);
        }
        let op = self.current_kind();
        if matches!(op, TokenKind::PlusPlus | TokenKind::MinusMinus) {
            self.get_token()?;
            return Ok(self.finish_expression(ExpressionKind::Postfix {
                op,
                operand: Box::new(lhs),
            }));
        }
        Ok(lhs)
    }

    fn parse_unary_expression(&mut self) -> Result<Expression> {
        let op = self.current_kind();
        match op {
            TokenKind::Delete
            | TokenKind::Void
            | TokenKind::Typeof
            | TokenKind::PlusPlus
            | TokenKind::MinusMinus
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::BitNot
            | TokenKind::Not => {
                self.get_token()?;
                let operand = self.parse_unary_expression()?;
                Ok(self.finish_expression(ExpressionKind::Prefix {
                    op,
                    operand: Box::new(operand),
                }))
            }
            _ => self.parse_postfix_expression(),
        }
    }

    /// Precedence climbing over binary (and conditional) operators.
    fn parse_expression_rec(
        &mut self,
        mut lhs: Expression,
        outer_precedence: i32,
    ) -> Result<Expression> {
        loop {
            let op = self.current_kind();
            let precedence = operator_precedence(op);
            if precedence > outer_precedence {
                break;
            }
            self.get_token()?;
            if op == TokenKind::Question {
                let consequent = self.parse_assignment_expression()?;
                self.expect(TokenKind::Colon, "conditional expression")?;
                let alternate = self.parse_assignment_expression()?;
                lhs = self.finish_expression(ExpressionKind::Conditional {
                    condition: Box::new(lhs),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                });
                continue;
            }
            let mut rhs = self.parse_unary_expression()?;
            loop {
                let look_ahead = self.current_kind();
                let look_ahead_precedence = operator_precedence(look_ahead);
                if look_ahead_precedence > precedence
                    || (look_ahead_precedence == precedence && !is_right_to_left(look_ahead))
                {
                    break;
                }
                rhs = self.parse_expression_rec(rhs, look_ahead_precedence)?;
            }
            lhs = self.finish_expression(ExpressionKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        Ok(lhs)
    }

    fn parse_assignment_expression(&mut self) -> Result<Expression> {
        let first = self.parse_unary_expression()?;
        self.parse_expression_rec(first, ASSIGNMENT_PRECEDENCE)
    }

    fn parse_expression(&mut self) -> Result<Expression> {
        self.with_expression_scope(|p| {
            let first = p.parse_assignment_expression()?;
            p.parse_expression_rec(first, COMMA_PRECEDENCE)
        })
    }

    fn parse_argument_list(&mut self) -> Result<Vec<Expression>> {
        self.expect(TokenKind::LParen, "argument list")?;
        let mut arguments = Vec::new();
        if self.accept(TokenKind::RParen)?.is_none() {
            loop {
                arguments.push(self.parse_assignment_expression()?);
                if self.accept(TokenKind::Comma)?.is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "argument list")?;
        }
        Ok(arguments)
    }

    fn parse_member_expression(&mut self) -> Result<Expression> {
        // MemberExpression :
        //  PrimaryExpression
        //  MemberExpression [ Expression ]
        //  MemberExpression . Identifier
        //  new MemberExpression Arguments
        let mut member = if self.accept(TokenKind::New)?.is_some() {
            let mut operand = self.parse_member_expression()?;
            if self.current_kind() == TokenKind::LParen {
                let arguments = self.parse_argument_list()?;
                operand = self.finish_expression(ExpressionKind::Call {
                    callee: Box::new(operand),
                    arguments,
                });
            }
            self.finish_expression(ExpressionKind::Prefix {
                op: TokenKind::New,
                operand: Box::new(operand),
            })
        } else {
            self.parse_primary_expression()?
        };
        loop {
            if self.accept(TokenKind::LBracket)?.is_some() {
                let index = self.parse_expression()?;
                self.expect(TokenKind::RBracket, "member expression")?;
                member = self.finish_expression(ExpressionKind::Binary {
                    op: TokenKind::LBracket,
                    lhs: Box::new(member),
                    rhs: Box::new(index),
                });
            } else if self.accept(TokenKind::Dot)?.is_some() {
                member = self.parse_property_access(member)?;
            } else {
                return Ok(member);
            }
        }
    }

    /// `.name` desugars to indexing with a string literal.
    fn parse_property_access(&mut self, base: Expression) -> Result<Expression> {
        let name = self.expect(TokenKind::Identifier, "property access")?;
        let literal =
            self.finish_expression(ExpressionKind::Literal(Literal::String(name.text().to_owned())));
        Ok(self.finish_expression(ExpressionKind::Binary {
            op: TokenKind::Dot,
            lhs: Box::new(base),
            rhs: Box::new(literal),
        }))
    }

    fn parse_left_hand_side_expression(&mut self) -> Result<Expression> {
        // LeftHandSideExpression :
        //  NewExpression
        //  CallExpression
        //
        // CallExpression :
        //  MemberExpression Arguments
        //  CallExpression Arguments
        //  CallExpression [ Expression ]
        //  CallExpression . Identifier
        let mut expression = self.parse_member_expression()?;
        loop {
            if self.current_kind() == TokenKind::LParen {
                let arguments = self.parse_argument_list()?;
                expression = self.finish_expression(ExpressionKind::Call {
                    callee: Box::new(expression),
                    arguments,
                });
            } else if self.accept(TokenKind::LBracket)?.is_some() {
                let index = self.parse_expression()?;
                self.expect(TokenKind::RBracket, "call expression")?;
                expression = self.finish_expression(ExpressionKind::Binary {
                    op: TokenKind::LBracket,
                    lhs: Box::new(expression),
                    rhs: Box::new(index),
                });
            } else if self.accept(TokenKind::Dot)?.is_some() {
                expression = self.parse_property_access(expression)?;
            } else {
                return Ok(expression);
            }
        }
    }

    // ---- Statements -------------------------------------------------------

    fn parse_block(&mut self) -> Result<Statement> {
        self.expect(TokenKind::LBrace, "block")?;
        let mut statements = Vec::new();
        while self.accept(TokenKind::RBrace)?.is_none() {
            statements.push(self.parse_statement_or_function_declaration()?);
        }
        Ok(self.finish_statement(StatementKind::Block(statements)))
    }

    fn parse_variable_declaration_list(&mut self) -> Result<Vec<Declaration>> {
        let mut declarations = Vec::new();
        loop {
            let name = self
                .expect(TokenKind::Identifier, "variable declaration")?
                .text()
                .to_owned();
            let initializer = if self.accept(TokenKind::Assign)?.is_some() {
                Some(self.with_expression_scope(|p| p.parse_assignment_expression())?)
            } else {
                None
            };
            declarations.push(Declaration { name, initializer });
            if self.accept(TokenKind::Comma)?.is_none() {
                break;
            }
        }
        Ok(declarations)
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        self.with_statement_scope(Self::parse_statement_inner)
    }

    fn parse_statement_inner(&mut self) -> Result<Statement> {
        // Statement :
        //  Block
        //  VariableStatement
        //  EmptyStatement
        //  ExpressionStatement
        //  IfStatement
        //  IterationStatement
        //  ContinueStatement
        //  BreakStatement
        //  ReturnStatement
        //  WithStatement
        if self.current_kind() == TokenKind::LBrace {
            self.parse_block()
        } else if self.accept(TokenKind::Var)?.is_some() {
            let declarations = self.parse_variable_declaration_list()?;
            self.expect_semicolon_allow_insertion("variable statement")?;
            Ok(self.finish_statement(StatementKind::Variable(declarations)))
        } else if self.current_kind() == TokenKind::Semicolon {
            self.get_token()?;
            Ok(self.finish_statement(StatementKind::Empty))
        } else if self.accept(TokenKind::If)?.is_some() {
            self.expect(TokenKind::LParen, "if statement")?;
            let condition = self.parse_expression()?;
            self.expect(TokenKind::RParen, "if statement")?;
            let consequent = self.parse_statement()?;
            self.accept(TokenKind::Semicolon)?;
            let alternate = if self.accept(TokenKind::Else)?.is_some() {
                Some(Box::new(self.parse_statement()?))
            } else {
                None
            };
            Ok(self.finish_statement(StatementKind::If {
                condition,
                consequent: Box::new(consequent),
                alternate,
            }))
        } else if self.accept(TokenKind::While)?.is_some() {
            self.expect(TokenKind::LParen, "while statement")?;
            let condition = self.parse_expression()?;
            self.expect(TokenKind::RParen, "while statement")?;
            let body = self.parse_statement()?;
            Ok(self.finish_statement(StatementKind::While {
                condition,
                body: Box::new(body),
            }))
        } else if self.accept(TokenKind::For)?.is_some() {
            self.parse_for_statement()
        } else if self.accept(TokenKind::Continue)?.is_some() {
            self.expect_semicolon_allow_insertion("continue statement")?;
            Ok(self.finish_statement(StatementKind::Continue))
        } else if self.accept(TokenKind::Break)?.is_some() {
            self.expect_semicolon_allow_insertion("break statement")?;
            Ok(self.finish_statement(StatementKind::Break))
        } else if self.accept(TokenKind::Return)?.is_some() {
            // A line break after `return` ends the statement.
            let mut expression = None;
            if !self.line_break_skipped && self.current_kind() != TokenKind::Semicolon {
                expression = Some(self.parse_expression()?);
            }
            self.expect_semicolon_allow_insertion("return statement")?;
            Ok(self.finish_statement(StatementKind::Return(expression)))
        } else if self.accept(TokenKind::With)?.is_some() {
            self.expect(TokenKind::LParen, "with statement")?;
            let object = self.parse_expression()?;
            self.expect(TokenKind::RParen, "with statement")?;
            let body = self.parse_statement()?;
            Ok(self.finish_statement(StatementKind::With {
                object,
                body: Box::new(body),
            }))
        } else {
            let expression = self.parse_expression()?;
            self.expect_semicolon_allow_insertion("expression statement")?;
            Ok(self.finish_statement(StatementKind::Expression(expression)))
        }
    }

    fn parse_for_statement(&mut self) -> Result<Statement> {
        self.expect(TokenKind::LParen, "for statement")?;
        let mut init = None;
        if self.accept(TokenKind::Semicolon)?.is_none() {
            let init_statement = if self.accept(TokenKind::Var)?.is_some() {
                let declarations = self.parse_variable_declaration_list()?;
                self.finish_statement(StatementKind::Variable(declarations))
            } else {
                let expression = self.parse_expression()?;
                self.finish_statement(StatementKind::Expression(expression))
            };
            if self.accept(TokenKind::In)?.is_some() {
                if let StatementKind::Variable(declarations) = &init_statement.kind {
                    // Only a single variable declaration is legal here.
                    if declarations.len() != 1 {
                        return Err(self.syntax_error(
                            "for-in statement",
                            "for-in allows exactly one variable declaration".to_string(),
                        ));
                    }
                }
                let object = self.parse_expression()?;
                self.expect(TokenKind::RParen, "for-in statement")?;
                let body = self.parse_statement()?;
                return Ok(self.finish_statement(StatementKind::ForIn {
                    init: Box::new(init_statement),
                    object,
                    body: Box::new(body),
                }));
            }
            init = Some(Box::new(init_statement));
            self.expect(TokenKind::Semicolon, "for statement")?;
        }
        let condition = if self.accept(TokenKind::Semicolon)?.is_none() {
            let expression = self.parse_expression()?;
            self.expect(TokenKind::Semicolon, "for statement")?;
            Some(expression)
        } else {
            None
        };
        let iter = if self.accept(TokenKind::RParen)?.is_none() {
            let expression = self.parse_expression()?;
            self.expect(TokenKind::RParen, "for statement")?;
            Some(expression)
        } else {
            None
        };
        let body = self.parse_statement()?;
        Ok(self.finish_statement(StatementKind::For {
            init,
            condition,
            iter,
            body: Box::new(body),
        }))
    }

    fn parse_function(&mut self) -> Result<Statement> {
        self.with_statement_scope(|p| {
            p.expect(TokenKind::Function, "function declaration")?;
            let name = p
                .expect(TokenKind::Identifier, "function declaration")?
                .text()
                .to_owned();
            // The recorded function source spans from just before the
            // parameter list through the closing brace.
            let body_start = p.lexer.current_token().start;
            p.expect(TokenKind::LParen, "function declaration")?;
            let mut params = Vec::new();
            if p.accept(TokenKind::RParen)?.is_none() {
                loop {
                    params.push(
                        p.expect(TokenKind::Identifier, "parameter list")?
                            .text()
                            .to_owned(),
                    );
                    if p.accept(TokenKind::Comma)?.is_none() {
                        break;
                    }
                }
                p.expect(TokenKind::RParen, "parameter list")?;
            }
            let block = p.parse_block()?;
            let body_end = block.extent.end;
            let body_extent = SourceExtent::new(p.file.clone(), body_start, body_end);
            Ok(p.finish_statement(StatementKind::FunctionDefinition {
                name,
                params,
                body_extent,
                block: Box::new(block),
            }))
        })
    }

    fn parse_statement_or_function_declaration(&mut self) -> Result<Statement> {
        self.skip_whitespace()?;
        if self.current_kind() == TokenKind::Function {
            self.parse_function()
        } else {
            self.parse_statement()
        }
    }
}
