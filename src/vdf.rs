//! Minimal reader for Valve's KeyValues ("VDF") text format, scoped to what
//! `appmanifest_<id>.acf` needs: nested `"Key" "Value"` pairs and `"Key" {
//! ... }` blocks. No ecosystem crate in this stack covers this narrow,
//! Steam-specific format, so it is hand-rolled rather than pulled in.

use std::collections::HashMap;

/// A parsed KeyValues node: either a leaf string or a nested block.
#[derive(Debug, Clone)]
pub enum Node {
    Leaf(String),
    Block(HashMap<String, Node>),
}

impl Node {
    /// Look up a dotted path of keys (e.g. `"AppState.installdir"`) and
    /// return the leaf string value, if the full path resolves to one.
    pub fn get_path(&self, path: &str) -> Option<&str> {
        let mut node = self;
        for key in path.split('.') {
            match node {
                Node::Block(map) => node = map.get(key)?,
                Node::Leaf(_) => return None,
            }
        }
        match node {
            Node::Leaf(value) => Some(value.as_str()),
            Node::Block(_) => None,
        }
    }
}

/// Parse a full KeyValues document into a single root block.
pub fn parse(text: &str) -> Result<Node, String> {
    let mut tokens = tokenize(text).into_iter().peekable();
    let mut root = HashMap::new();
    parse_block(&mut tokens, &mut root)?;
    Ok(Node::Block(root))
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Str(String),
    Open,
    Close,
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '{' => {
                tokens.push(Token::Open);
                chars.next();
            }
            '}' => {
                tokens.push(Token::Close);
                chars.next();
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '"' {
                        chars.next();
                        break;
                    }
                    if c == '\\' {
                        chars.next();
                        if let Some(escaped) = chars.next() {
                            s.push(escaped);
                        }
                        continue;
                    }
                    s.push(c);
                    chars.next();
                }
                tokens.push(Token::Str(s));
            }
            '/' => {
                // Comments: `//` to end of line.
                chars.next();
                if chars.peek() == Some(&'/') {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            _ => {
                chars.next();
            }
        }
    }
    tokens
}

fn parse_block(
    tokens: &mut std::iter::Peekable<std::vec::IntoIter<Token>>,
    out: &mut HashMap<String, Node>,
) -> Result<(), String> {
    loop {
        match tokens.next() {
            None | Some(Token::Close) => return Ok(()),
            Some(Token::Str(key)) => match tokens.peek() {
                Some(Token::Open) => {
                    tokens.next();
                    let mut nested = HashMap::new();
                    parse_block(tokens, &mut nested)?;
                    out.insert(key, Node::Block(nested));
                }
                Some(Token::Str(_)) => {
                    if let Some(Token::Str(value)) = tokens.next() {
                        out.insert(key, Node::Leaf(value));
                    }
                }
                _ => return Err(format!("expected value after key {key:?}")),
            },
            Some(Token::Open) => return Err("unexpected '{' without preceding key".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_appmanifest() {
        let text = r#"
            "AppState"
            {
                "appid"      "2394010"
                "installdir" "PalServer"
                "UserConfig"
                {
                    "language" "english"
                }
            }
        "#;
        let root = parse(text).expect("parse");
        assert_eq!(root.get_path("AppState.installdir"), Some("PalServer"));
        assert_eq!(root.get_path("AppState.UserConfig.language"), Some("english"));
        assert_eq!(root.get_path("AppState.missing"), None);
    }
}
