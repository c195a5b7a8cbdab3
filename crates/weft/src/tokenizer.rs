//! Splits template source into literal text and delimited tokens.
//!
//! Delimiters are matched non-greedily and never nest: a `{{` runs until the
//! first `}}` after it, line breaks included. An opener without its closer is
//! plain text.

use std::ops::Range;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Text,
    /// `{{ ... }}`
    Expr,
    /// `{% ... %}`
    Tag,
    /// `{# ... #}`
    Comment,
}

impl TokenKind {
    fn closer(self) -> &'static str {
        match self {
            Self::Text => "",
            Self::Expr => "}}",
            Self::Tag => "%}",
            Self::Comment => "#}",
        }
    }

    fn from_opener(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [b'{', b'{', ..] => Some(Self::Expr),
            [b'{', b'%', ..] => Some(Self::Tag),
            [b'{', b'#', ..] => Some(Self::Comment),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl Token {
    pub(crate) fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The whole token, delimiters included.
    pub(crate) fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.span()]
    }

    /// The token without its delimiters.
    pub(crate) fn inner<'s>(&self, source: &'s str) -> &'s str {
        match self.kind {
            TokenKind::Text => self.text(source),
            _ => &source[(self.start + 2)..(self.end - 2)],
        }
    }
}

pub(crate) fn tokenize(source: &str) -> Vec<Token> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while let Some(offset) = source[pos..].find('{') {
        let open = pos + offset;
        let Some(kind) = TokenKind::from_opener(&bytes[open..]) else {
            pos = open + 1;
            continue;
        };

        let Some(close) = source[(open + 2)..].find(kind.closer()) else {
            pos = open + 1;
            continue;
        };
        let end = open + 2 + close + 2;

        if text_start < open {
            tokens.push(Token {
                kind: TokenKind::Text,
                start: text_start,
                end: open,
            });
        }
        tokens.push(Token {
            kind,
            start: open,
            end,
        });

        text_start = end;
        pos = end;
    }

    if text_start < source.len() {
        tokens.push(Token {
            kind: TokenKind::Text,
            start: text_start,
            end: source.len(),
        });
    }

    tokens
}

#[cfg(test)]
mod test {
    use super::*;

    fn kinds_and_text(source: &str) -> Vec<(TokenKind, &str)> {
        tokenize(source)
            .into_iter()
            .map(|t| (t.kind, t.text(source)))
            .collect()
    }

    #[test]
    fn empty() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn no_tags() {
        assert_eq!(
            kinds_and_text("hello world"),
            [(TokenKind::Text, "hello world")]
        );
    }

    #[test]
    fn mixed() {
        assert_eq!(
            kinds_and_text("a{{ b }}c{% if d %}{# e #}f"),
            [
                (TokenKind::Text, "a"),
                (TokenKind::Expr, "{{ b }}"),
                (TokenKind::Text, "c"),
                (TokenKind::Tag, "{% if d %}"),
                (TokenKind::Comment, "{# e #}"),
                (TokenKind::Text, "f"),
            ]
        );
    }

    #[test]
    fn spans_line_breaks() {
        let source = "{#\n  note\n#}{{\nname\n}}";
        let tokens = tokenize(source);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(tokens[1].inner(source), "\nname\n");
    }

    #[test]
    fn non_greedy() {
        assert_eq!(
            kinds_and_text("{{ a }} and {{ b }}"),
            [
                (TokenKind::Expr, "{{ a }}"),
                (TokenKind::Text, " and "),
                (TokenKind::Expr, "{{ b }}"),
            ]
        );
    }

    #[test]
    fn unterminated_is_text() {
        assert_eq!(
            kinds_and_text("a {{ b {# c #}"),
            [(TokenKind::Text, "a {{ b "), (TokenKind::Comment, "{# c #}")]
        );
        assert_eq!(kinds_and_text("{% if"), [(TokenKind::Text, "{% if")]);
    }

    #[test]
    fn lone_braces() {
        assert_eq!(
            kinds_and_text("fn() { x }{{y}}"),
            [(TokenKind::Text, "fn() { x }"), (TokenKind::Expr, "{{y}}")]
        );
    }

    #[test]
    fn comment_hides_tags() {
        assert_eq!(
            kinds_and_text("{# {% if %} #}"),
            [(TokenKind::Comment, "{# {% if %} #}")]
        );
    }
}
