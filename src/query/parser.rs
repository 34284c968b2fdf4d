//! Query string parsing.
//!
//! The query language is small: bare words (prefix match), quoted words
//! (exact match), `name:value` / `name=value` filters with comparison
//! operators, implicit AND between space-separated terms, `|` (or the `or`
//! keyword) for OR, `-` for exclusion, and parentheses for grouping.

/// Comparison operator attached to a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Prefix/variation match (`name:value`, bare words).
    Contains,
    /// Exact match (`name=value`, quoted words).
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

/// Query AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    /// Free word search; `exact` when the word was quoted.
    Word { text: String, exact: bool },
    /// `name<op>value` filter term.
    Filter {
        name: String,
        op: CompareOp,
        value: String,
    },
    /// All children must match; the left result narrows the right.
    And(Vec<QueryNode>),
    /// Any child may match.
    Or(Vec<QueryNode>),
    /// Exclude matching documents.
    Not(Box<QueryNode>),
    /// Empty query, matches nothing.
    Empty,
}

/// Parse a query string. Parsing never fails; malformed fragments degrade to
/// word terms so incremental typing always produces a usable query.
pub fn parse_query(input: &str) -> QueryNode {
    QueryParser::new(input).parse()
}

struct QueryParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> QueryParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse(&mut self) -> QueryNode {
        let node = self.parse_or();
        match node {
            QueryNode::And(nodes) if nodes.is_empty() => QueryNode::Empty,
            other => other,
        }
    }

    fn parse_or(&mut self) -> QueryNode {
        let mut nodes = vec![self.parse_and()];

        self.skip_whitespace();
        while self.consume_or() {
            self.skip_whitespace();
            nodes.push(self.parse_and());
            self.skip_whitespace();
        }

        if nodes.len() == 1 {
            nodes.pop().unwrap_or(QueryNode::Empty)
        } else {
            QueryNode::Or(nodes)
        }
    }

    fn parse_and(&mut self) -> QueryNode {
        let mut nodes = Vec::new();

        loop {
            self.skip_whitespace();
            if self.is_eof() || self.peek() == Some(')') || self.peek() == Some('|') {
                break;
            }
            if self.peek_word() == Some("or") {
                break;
            }
            match self.parse_unary() {
                QueryNode::Empty => {}
                node => nodes.push(node),
            }
        }

        match nodes.len() {
            0 => QueryNode::Empty,
            1 => nodes.pop().unwrap_or(QueryNode::Empty),
            _ => QueryNode::And(nodes),
        }
    }

    fn parse_unary(&mut self) -> QueryNode {
        self.skip_whitespace();
        if self.consume_char('-') {
            let inner = self.parse_primary();
            if inner == QueryNode::Empty {
                return QueryNode::Empty;
            }
            return QueryNode::Not(Box::new(inner));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> QueryNode {
        self.skip_whitespace();

        if self.consume_char('(') {
            let node = self.parse_or();
            self.skip_whitespace();
            self.consume_char(')');
            return node;
        }

        if self.peek() == Some('"') {
            return self.parse_quoted();
        }

        self.parse_term()
    }

    fn parse_quoted(&mut self) -> QueryNode {
        self.consume_char('"');
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch == '"' {
                break;
            }
            self.advance(ch);
        }
        let text = self.input[start..self.pos].to_string();
        self.consume_char('"');
        if text.is_empty() {
            QueryNode::Empty
        } else {
            QueryNode::Word { text, exact: true }
        }
    }

    /// A single token: either `word` or `name<op>value`.
    fn parse_term(&mut self) -> QueryNode {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || ch == ')' || ch == '|' {
                break;
            }
            self.advance(ch);
        }
        let token = &self.input[start..self.pos];
        if token.is_empty() {
            return QueryNode::Empty;
        }

        if let Some((name, op, value)) = split_filter(token) {
            if name.is_empty() || value.is_empty() {
                // Dangling operator during incremental typing; fall back to
                // the textual part so the query still returns something.
                let text = if name.is_empty() { value } else { name };
                if text.is_empty() {
                    return QueryNode::Empty;
                }
                return QueryNode::Word {
                    text: text.to_string(),
                    exact: false,
                };
            }
            return QueryNode::Filter {
                name: name.to_string(),
                op,
                value: value.to_string(),
            };
        }

        QueryNode::Word {
            text: token.to_string(),
            exact: false,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.advance(ch);
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// The next whitespace-delimited word, without consuming it.
    fn peek_word(&self) -> Option<&str> {
        let rest = &self.input[self.pos..];
        let end = rest
            .char_indices()
            .find(|(_, c)| c.is_whitespace() || *c == ')' || *c == '|')
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if end == 0 { None } else { Some(&rest[..end]) }
    }

    fn consume_or(&mut self) -> bool {
        if self.consume_char('|') {
            return true;
        }
        if self.peek_word() == Some("or") {
            self.pos += 2;
            return true;
        }
        false
    }

    fn consume_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance(expected);
            true
        } else {
            false
        }
    }

    fn advance(&mut self, ch: char) {
        self.pos += ch.len_utf8();
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }
}

/// Split `name<op>value` at the first operator character. Returns `None` for
/// plain words.
fn split_filter(token: &str) -> Option<(&str, CompareOp, &str)> {
    let idx = token.find([':', '=', '<', '>', '!'])?;
    let (name, rest) = token.split_at(idx);
    let (op, value) = if let Some(value) = rest.strip_prefix(":") {
        (CompareOp::Contains, value)
    } else if let Some(value) = rest.strip_prefix("!=") {
        (CompareOp::NotEqual, value)
    } else if let Some(value) = rest.strip_prefix("<=") {
        (CompareOp::LessOrEqual, value)
    } else if let Some(value) = rest.strip_prefix(">=") {
        (CompareOp::GreaterOrEqual, value)
    } else if let Some(value) = rest.strip_prefix("<") {
        (CompareOp::Less, value)
    } else if let Some(value) = rest.strip_prefix(">") {
        (CompareOp::Greater, value)
    } else if let Some(value) = rest.strip_prefix("=") {
        (CompareOp::Equal, value)
    } else {
        return None;
    };
    Some((name, op, value))
}
