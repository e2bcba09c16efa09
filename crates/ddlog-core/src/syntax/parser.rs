//! Error-tolerant recursive-descent parser for DDlog declarations.
//!
//! Only the declaration structure is modelled (imports, relations, rules,
//! functions, typedefs, transformers, indexes, applies). Expressions, rule
//! bodies and type expressions are skipped with bracket balancing. Any region
//! the parser cannot make sense of becomes an [`NodeKind::Error`] node and
//! parsing resumes at the next declaration boundary, so one bad item never
//! hides the rest of the file.

use super::lexer::{Token, TokenKind, tokenize};
use super::tree::{Name, Node, NodeId, NodeKind, RelationRole, SyntaxTree};
use std::ops::Range;

/// Keywords that start a top-level declaration.
const DECL_KEYWORDS: &[&str] = &[
    "import",
    "input",
    "output",
    "internal",
    "relation",
    "stream",
    "multiset",
    "typedef",
    "type",
    "function",
    "fn",
    "extern",
    "transformer",
    "index",
    "apply",
];

/// Parses a complete DDlog source file.
pub fn parse(source: &str) -> SyntaxTree {
    let tokens = tokenize(source);
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        nodes: Vec::new(),
    };

    let mut roots = Vec::new();
    while !parser.at_end() {
        if let Some(id) = parser.item() {
            roots.push(id);
        }
    }

    tracing::trace!(
        nodes = parser.nodes.len(),
        roots = roots.len(),
        "parsed ddlog source"
    );

    SyntaxTree {
        nodes: parser.nodes,
        roots,
        source_len: source.len(),
    }
}

struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    pos: usize,
    nodes: Vec<Node>,
}

impl<'s> Parser<'s> {
    // ---------------------------------------------------------------------
    // Token helpers
    // ---------------------------------------------------------------------

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn text(&self, token: &Token) -> &'s str {
        token.text(self.source)
    }

    fn peek_is_word(&self, word: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == TokenKind::Ident && self.text(t) == word)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.peek_kind() == Some(kind) {
            self.bump()
        } else {
            None
        }
    }

    fn eat_word(&mut self, word: &str) -> Option<Token> {
        if self.peek_is_word(word) {
            self.bump()
        } else {
            None
        }
    }

    /// End offset of the last consumed token.
    fn last_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|idx| self.tokens.get(idx))
            .map_or(0, |t| t.span.end)
    }

    /// Start offset of the next token, or end of input.
    fn next_start(&self) -> usize {
        self.peek().map_or(self.source.len(), |t| t.span.start)
    }

    fn is_decl_keyword(&self, token: &Token) -> bool {
        token.kind == TokenKind::Ident && DECL_KEYWORDS.contains(&self.text(token))
    }

    /// True if the token is the first thing on its line, at column zero.
    fn at_line_start(&self, token: &Token) -> bool {
        token.span.start == 0 || self.source.as_bytes()[token.span.start - 1] == b'\n'
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn error(&mut self, span: Range<usize>, message: impl Into<String>) -> NodeId {
        self.push(Node {
            kind: NodeKind::Error {
                message: message.into(),
            },
            span,
            name: None,
            detail: None,
            children: Vec::new(),
        })
    }

    fn name_of(&self, token: &Token) -> Name {
        Name {
            text: self.text(token).to_string(),
            span: token.span.clone(),
        }
    }

    // ---------------------------------------------------------------------
    // Skipping
    // ---------------------------------------------------------------------

    /// Consumes one token and updates bracket depth. Closing brackets at depth
    /// zero are consumed without going negative.
    fn bump_tracking(&mut self, depth: &mut usize) {
        if let Some(token) = self.bump() {
            match token.kind {
                TokenKind::LParen | TokenKind::LBrace | TokenKind::LBracket => *depth += 1,
                TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket => {
                    *depth = depth.saturating_sub(1);
                }
                _ => {}
            }
        }
    }

    /// Skips a balanced group starting at an opening bracket.
    fn skip_group(&mut self) -> bool {
        let mut depth = 0;
        loop {
            if self.at_end() {
                return false;
            }
            self.bump_tracking(&mut depth);
            if depth == 0 {
                return true;
            }
        }
    }

    /// Skips the remainder of an item: stops at depth zero before a
    /// declaration keyword or a token at column zero.
    fn skip_item_tail(&mut self) {
        let mut depth = 0;
        while let Some(token) = self.peek() {
            if depth == 0
                && (self.is_decl_keyword(token)
                    || (self.at_line_start(token) && token.kind != TokenKind::Pipe))
            {
                break;
            }
            self.bump_tracking(&mut depth);
        }
    }

    /// Skips a type expression up to (not including) one of `stops` at depth
    /// zero. Angle brackets count as nesting inside types.
    fn skip_type(&mut self, stops: &[TokenKind]) -> Option<Range<usize>> {
        let start = self.next_start();
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            if depth == 0 && (stops.contains(&token.kind) || self.is_decl_keyword(token)) {
                break;
            }
            match token.kind {
                TokenKind::Lt => depth += 1,
                TokenKind::Gt => depth = depth.saturating_sub(1),
                TokenKind::LParen | TokenKind::LBrace | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.bump();
        }
        let end = self.last_end();
        (end > start).then_some(start..end)
    }

    /// Error recovery: guarantees progress past the item's first token, then
    /// stops at the next declaration boundary. A terminating `.` is consumed.
    fn recover(&mut self, start: usize, message: &str) -> NodeId {
        let mut depth = 0;
        if self.peek().is_some_and(|t| t.span.start == start) {
            self.bump_tracking(&mut depth);
        }
        while let Some(token) = self.peek() {
            if depth == 0 {
                if token.kind == TokenKind::TerminalDot {
                    self.bump();
                    break;
                }
                if self.is_decl_keyword(token)
                    || (self.at_line_start(token) && token.kind == TokenKind::Ident)
                {
                    break;
                }
            }
            self.bump_tracking(&mut depth);
        }
        let end = self.last_end();
        self.error(start..end, message)
    }

    // ---------------------------------------------------------------------
    // Items
    // ---------------------------------------------------------------------

    fn item(&mut self) -> Option<NodeId> {
        self.skip_attributes();
        let token = self.peek()?.clone();
        let start = token.span.start;

        if token.kind != TokenKind::Ident {
            if token.kind == TokenKind::Amp {
                return Some(self.rule(start));
            }
            let message = format!("unexpected `{}`", self.text(&token));
            return Some(self.recover(start, &message));
        }

        let id = match self.text(&token) {
            "import" => self.import(start),
            "input" => self.relation_with_role(start, RelationRole::Input),
            "output" => self.relation_with_role(start, RelationRole::Output),
            "internal" => self.relation_with_role(start, RelationRole::Internal),
            "relation" | "stream" | "multiset" => self.relation(start, RelationRole::Internal),
            "typedef" | "type" => {
                self.bump();
                self.typedef(start, false)
            }
            "function" | "fn" => {
                self.bump();
                self.function(start, false)
            }
            "extern" => self.extern_item(start),
            "transformer" => {
                self.bump();
                self.named_item(start, NodeKind::Transformer, "transformer")
            }
            "index" => {
                self.bump();
                self.named_item(start, NodeKind::Index, "index")
            }
            "apply" => {
                self.bump();
                self.named_item(start, NodeKind::Apply, "apply")
            }
            word if word.starts_with(char::is_uppercase) || self.is_scoped_upper() => {
                self.rule(start)
            }
            word => {
                let message = format!("unexpected identifier `{word}`");
                self.recover(start, &message)
            }
        };
        Some(id)
    }

    fn skip_attributes(&mut self) {
        while self.peek_kind() == Some(TokenKind::Hash)
            && self.peek_nth(1).map(|t| t.kind) == Some(TokenKind::LBracket)
        {
            self.bump();
            self.skip_group();
        }
    }

    /// `a::b::R` where the final segment is capitalized.
    fn is_scoped_upper(&self) -> bool {
        let mut offset = 0;
        loop {
            let Some(ident) = self.peek_nth(offset) else {
                return false;
            };
            if ident.kind != TokenKind::Ident {
                return false;
            }
            match self.peek_nth(offset + 1).map(|t| t.kind) {
                Some(TokenKind::PathSep) => offset += 2,
                _ => return self.text(ident).starts_with(char::is_uppercase) && offset > 0,
            }
        }
    }

    /// Parses `ident (:: ident)*`, returning the segments and their span.
    fn path(&mut self) -> Option<(Vec<String>, Range<usize>)> {
        let first = self.eat(TokenKind::Ident)?;
        let start = first.span.start;
        let mut segments = vec![self.text(&first).to_string()];
        while self.peek_kind() == Some(TokenKind::PathSep)
            && self.peek_nth(1).map(|t| t.kind) == Some(TokenKind::Ident)
        {
            self.bump();
            if let Some(segment) = self.bump() {
                segments.push(self.text(&segment).to_string());
            }
        }
        Some((segments, start..self.last_end()))
    }

    fn import(&mut self, start: usize) -> NodeId {
        self.bump();
        if self.peek().is_some_and(|t| self.is_decl_keyword(t)) {
            return self.recover(start, "expected module path after `import`");
        }
        let Some((segments, path_span)) = self.path() else {
            return self.recover(start, "expected module path after `import`");
        };

        let mut alias = None;
        let mut children = Vec::new();
        if self.eat_word("as").is_some() {
            match self.eat(TokenKind::Ident) {
                Some(token) => alias = Some(self.text(&token).to_string()),
                None => {
                    let at = self.next_start();
                    children.push(self.error(at..at, "expected alias after `as`"));
                }
            }
        }

        self.push(Node {
            kind: NodeKind::Import { segments, alias },
            span: start..self.last_end(),
            name: Some(Name {
                text: self.source[path_span.clone()].to_string(),
                span: path_span,
            }),
            detail: None,
            children,
        })
    }

    fn relation_with_role(&mut self, start: usize, role: RelationRole) -> NodeId {
        self.bump();
        if self.peek_is_word("relation") || self.peek_is_word("stream") || self.peek_is_word("multiset")
        {
            self.relation(start, role)
        } else {
            self.recover(start, "expected `relation` after relation role")
        }
    }

    /// Parses from the `relation` keyword.
    fn relation(&mut self, start: usize, role: RelationRole) -> NodeId {
        self.bump();
        self.eat(TokenKind::Amp);
        let Some(name) = self.eat(TokenKind::Ident) else {
            return self.recover(start, "expected relation name");
        };
        let name = self.name_of(&name);

        let mut children = Vec::new();
        match self.peek_kind() {
            Some(TokenKind::LParen) => {
                self.bump();
                children = self.typed_list(TokenKind::RParen, NodeKind::Column);
            }
            Some(TokenKind::LBracket) => {
                self.bump();
                self.skip_type(&[TokenKind::RBracket]);
                if self.eat(TokenKind::RBracket).is_none() {
                    let at = self.next_start();
                    children.push(self.error(at..at, "expected `]`"));
                }
            }
            _ => {
                let at = self.next_start();
                children.push(self.error(at..at, "expected `(` or `[` after relation name"));
            }
        }

        if self.eat_word("primary").is_some() {
            self.eat_word("key");
            self.skip_item_tail();
        }

        self.push(Node {
            kind: NodeKind::Relation { role },
            span: start..self.last_end(),
            name: Some(name),
            detail: None,
            children,
        })
    }

    /// Parses `name: Type, ...` up to and including `close`, producing one
    /// node of `kind` per entry and error nodes for malformed entries.
    fn typed_list(&mut self, close: TokenKind, kind: NodeKind) -> Vec<NodeId> {
        let mut children = Vec::new();
        loop {
            match self.peek_kind() {
                None => {
                    let at = self.next_start();
                    children.push(self.error(at..at, "unclosed field list"));
                    return children;
                }
                Some(k) if k == close => {
                    self.bump();
                    return children;
                }
                Some(TokenKind::Comma) => {
                    self.bump();
                }
                Some(_) if self.peek().is_some_and(|t| self.is_decl_keyword(t)) => {
                    let at = self.next_start();
                    children.push(self.error(at..at, "unclosed field list"));
                    return children;
                }
                Some(_) => {
                    let entry = self.typed_entry(close, kind.clone());
                    children.push(entry);
                }
            }
        }
    }

    fn typed_entry(&mut self, close: TokenKind, kind: NodeKind) -> NodeId {
        let start = self.next_start();
        self.eat_word("mut");
        let name = match (self.peek_kind(), self.peek_nth(1).map(|t| t.kind)) {
            (Some(TokenKind::Ident), Some(TokenKind::Colon)) => {
                let token = self.bump();
                self.bump();
                token.map(|t| self.name_of(&t))
            }
            _ => None,
        };

        let ty = self.skip_type(&[TokenKind::Comma, close]);
        match name {
            Some(name) if ty.is_some() => {
                let detail = ty.map(|span| self.source[span].to_string());
                self.push(Node {
                    kind,
                    span: start..self.last_end(),
                    name: Some(name),
                    detail,
                    children: Vec::new(),
                })
            }
            Some(_) => {
                let end = self.last_end();
                self.error(start..end, "expected type after `:`")
            }
            None => {
                if self.last_end() <= start {
                    // Nothing consumed; make progress past the offending token.
                    let mut depth = 0;
                    self.bump_tracking(&mut depth);
                }
                let end = self.last_end();
                self.error(start..end, "expected `name: Type`")
            }
        }
    }

    fn typedef(&mut self, start: usize, is_extern: bool) -> NodeId {
        let Some(name) = self.eat(TokenKind::Ident) else {
            return self.recover(start, "expected type name");
        };
        let name = self.name_of(&name);

        if self.peek_kind() == Some(TokenKind::Lt) {
            self.skip_type(&[TokenKind::Eq]);
        }

        let mut children = Vec::new();
        if self.eat(TokenKind::Eq).is_some() {
            children = self.type_alternatives();
        } else if !is_extern {
            let at = self.next_start();
            children.push(self.error(at..at, "expected `=` in type definition"));
        }

        self.push(Node {
            kind: NodeKind::Typedef { is_extern },
            span: start..self.last_end(),
            name: Some(name),
            detail: None,
            children,
        })
    }

    /// Parses `A{x: T} | B | ...`. Plain type aliases produce no children.
    fn type_alternatives(&mut self) -> Vec<NodeId> {
        let mut children = Vec::new();
        let mut alternatives = 0;
        loop {
            alternatives += 1;
            let start = self.next_start();
            let is_constructor = matches!(
                (self.peek(), self.peek_nth(1).map(|t| t.kind)),
                (Some(t), next) if t.kind == TokenKind::Ident
                    && self.text(t).starts_with(char::is_uppercase)
                    && (next == Some(TokenKind::LBrace)
                        || next == Some(TokenKind::Pipe)
                        || alternatives > 1
                        || self.peek_nth(2).is_some_and(|t| t.kind == TokenKind::Pipe))
            );

            if is_constructor {
                let token = self.bump();
                let name = token.map(|t| self.name_of(&t));
                let mut fields = Vec::new();
                if self.eat(TokenKind::LBrace).is_some() {
                    fields = self.typed_list(TokenKind::RBrace, NodeKind::Field);
                }
                children.push(self.push(Node {
                    kind: NodeKind::Constructor,
                    span: start..self.last_end(),
                    name,
                    detail: None,
                    children: fields,
                }));
            } else {
                self.skip_type(&[TokenKind::Pipe]);
                if self.last_end() <= start && self.peek_kind() != Some(TokenKind::Pipe) {
                    children.push(self.error(start..start, "expected type"));
                    return children;
                }
            }

            let continues = self.peek_kind() == Some(TokenKind::Pipe);
            if !continues {
                return children;
            }
            self.bump();
        }
    }

    fn function(&mut self, start: usize, is_extern: bool) -> NodeId {
        let Some((_, name_span)) = self.path() else {
            return self.recover(start, "expected function name");
        };
        let name = Name {
            text: self.source[name_span.clone()].to_string(),
            span: name_span,
        };

        let mut children = Vec::new();
        if self.peek_kind() == Some(TokenKind::LParen) {
            if !self.skip_group() {
                let at = self.next_start();
                children.push(self.error(at..at, "unclosed argument list"));
            }
        } else {
            let at = self.next_start();
            children.push(self.error(at..at, "expected `(` after function name"));
        }

        let mut detail = None;
        if self.eat(TokenKind::Colon).is_some() {
            detail = self
                .skip_type(&[TokenKind::LBrace, TokenKind::Eq])
                .map(|span| self.source[span].to_string());
        }

        match self.peek_kind() {
            Some(TokenKind::LBrace) => {
                if !self.skip_group() {
                    let at = self.next_start();
                    children.push(self.error(at..at, "unclosed function body"));
                }
            }
            Some(TokenKind::Eq) => {
                self.bump();
                self.skip_item_tail();
            }
            _ if is_extern => {}
            _ => {
                let at = self.next_start();
                children.push(self.error(at..at, "expected function body"));
            }
        }

        self.push(Node {
            kind: NodeKind::Function { is_extern },
            span: start..self.last_end(),
            name: Some(name),
            detail,
            children,
        })
    }

    fn extern_item(&mut self, start: usize) -> NodeId {
        self.bump();
        if self.eat_word("function").is_some() || self.eat_word("fn").is_some() {
            self.function(start, true)
        } else if self.eat_word("type").is_some() || self.eat_word("typedef").is_some() {
            self.typedef(start, true)
        } else if self.eat_word("transformer").is_some() {
            self.named_item(start, NodeKind::Transformer, "transformer")
        } else {
            self.recover(start, "expected `function`, `type` or `transformer` after `extern`")
        }
    }

    /// Transformers, indexes and applies: a name followed by an opaque tail.
    fn named_item(&mut self, start: usize, kind: NodeKind, what: &str) -> NodeId {
        let Some(name) = self.eat(TokenKind::Ident) else {
            return self.recover(start, &format!("expected {what} name"));
        };
        let name = self.name_of(&name);
        self.skip_item_tail();
        self.push(Node {
            kind,
            span: start..self.last_end(),
            name: Some(name),
            detail: None,
            children: Vec::new(),
        })
    }

    /// Rules and facts: `Head(...)[, Head2(...)] [:- body].`
    fn rule(&mut self, start: usize) -> NodeId {
        self.eat(TokenKind::Amp);
        let Some((_, name_span)) = self.path() else {
            return self.recover(start, "expected relation name in rule head");
        };
        let name = Name {
            text: self.source[name_span.clone()].to_string(),
            span: name_span,
        };

        let mut is_fact = true;
        let mut terminated = false;
        let mut depth = 0;
        while let Some(token) = self.peek() {
            if depth == 0 {
                match token.kind {
                    TokenKind::TerminalDot => {
                        self.bump();
                        terminated = true;
                        break;
                    }
                    TokenKind::Turnstile => is_fact = false,
                    _ if self.is_decl_keyword(token) => break,
                    TokenKind::Ident if self.at_line_start(token) => break,
                    _ => {}
                }
            }
            self.bump_tracking(&mut depth);
        }

        let mut children = Vec::new();
        if !terminated {
            let end = self.last_end();
            children.push(self.error(end..end, "expected `.` at end of rule"));
        }

        self.push(Node {
            kind: NodeKind::Rule { is_fact },
            span: start..self.last_end(),
            name: Some(name),
            detail: None,
            children,
        })
    }
}
