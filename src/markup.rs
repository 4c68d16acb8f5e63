//! Lossless HTML tokenizer
//!
//! Splits a document into tokens whose raw bytes concatenate back to the
//! exact input. Only as much structure is recovered as patching needs:
//! tag names and attributes of start tags. Anything that doesn't look like
//! markup is text, so tokenizing never fails.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    StartTag {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    Comment,
    /// `<!DOCTYPE …>`, `<![CDATA[…]]>`, `<?…>` and other declarations
    Doctype,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub raw: &'a [u8],
}

impl Token<'_> {
    /// Value of attribute `name` on a start tag
    pub fn attr(&self, name: &str) -> Option<&str> {
        match &self.kind {
            TokenKind::StartTag { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn is_start_tag(&self, tag: &str) -> bool {
        matches!(&self.kind, TokenKind::StartTag { name, .. } if name == tag)
    }
}

pub struct Tokenizer<'a> {
    input: &'a [u8],
    pos: usize,
    /// Set after `<script>`/`<style>`: text runs until this end tag
    raw_text_until: Option<&'static [u8]>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            raw_text_until: None,
        }
    }

    fn rest(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    fn emit(&mut self, len: usize, kind: TokenKind) -> Token<'a> {
        let raw = &self.input[self.pos..self.pos + len];
        self.pos += len;
        Token { kind, raw }
    }

    fn raw_text(&mut self, end_tag: &'static [u8]) -> Token<'a> {
        let rest = self.rest();
        let len = find_ignore_case(rest, end_tag).unwrap_or(rest.len());
        self.emit(len, TokenKind::Text)
    }

    fn text(&mut self) -> Token<'a> {
        let rest = self.rest();
        // A leading '<' that didn't start markup belongs to this text run.
        let len = rest[1..]
            .iter()
            .position(|&b| b == b'<')
            .map_or(rest.len(), |i| i + 1);
        self.emit(len, TokenKind::Text)
    }

    fn markup(&mut self) -> Option<Token<'a>> {
        let rest = self.rest();
        match *rest.get(1)? {
            b'!' if rest.starts_with(b"<!--") => {
                let len = find(&rest[4..], b"-->")? + 4 + 3;
                Some(self.emit(len, TokenKind::Comment))
            }
            b'!' | b'?' => {
                let len = find(rest, b">")? + 1;
                Some(self.emit(len, TokenKind::Doctype))
            }
            b'/' if rest.get(2).is_some_and(u8::is_ascii_alphabetic) => {
                let len = find(rest, b">")? + 1;
                let name = tag_name(&rest[2..]);
                Some(self.emit(len, TokenKind::EndTag { name }))
            }
            c if c.is_ascii_alphabetic() => {
                let (len, kind) = start_tag(rest)?;
                if let TokenKind::StartTag {
                    name,
                    self_closing: false,
                    ..
                } = &kind
                {
                    self.raw_text_until = match name.as_str() {
                        "script" => Some(&b"</script"[..]),
                        "style" => Some(&b"</style"[..]),
                        _ => None,
                    };
                }
                Some(self.emit(len, kind))
            }
            _ => None,
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if self.pos >= self.input.len() {
            return None;
        }

        if let Some(end_tag) = self.raw_text_until.take() {
            if !self.rest().is_empty() && find_ignore_case(self.rest(), end_tag) != Some(0) {
                return Some(self.raw_text(end_tag));
            }
        }

        if self.rest()[0] == b'<' {
            if let Some(token) = self.markup() {
                return Some(token);
            }
        }

        Some(self.text())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn find_ignore_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}

fn tag_name_len(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .position(|&b| is_space(b) || b == b'/' || b == b'>')
        .unwrap_or(bytes.len())
}

fn tag_name(bytes: &[u8]) -> String {
    String::from_utf8_lossy(&bytes[..tag_name_len(bytes)]).to_ascii_lowercase()
}

/// Parse a start tag at the beginning of `input` (which starts with `<`).
///
/// Returns the tag's length in bytes, or `None` if it never closes.
fn start_tag(input: &[u8]) -> Option<(usize, TokenKind)> {
    let name = tag_name(&input[1..]);
    let mut i = 1 + tag_name_len(&input[1..]);
    let mut attrs = Vec::new();
    let mut self_closing = false;

    loop {
        while i < input.len() && is_space(input[i]) {
            i += 1;
        }
        match *input.get(i)? {
            b'>' => {
                i += 1;
                break;
            }
            b'/' => {
                i += 1;
                self_closing = input.get(i) == Some(&b'>');
                continue;
            }
            _ => {}
        }

        let key_start = i;
        while i < input.len() && !is_space(input[i]) && !matches!(input[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        // A lone '=' or similar junk; consume it so we always make progress.
        if i == key_start {
            i += 1;
            continue;
        }
        let key = String::from_utf8_lossy(&input[key_start..i]).to_ascii_lowercase();

        let mut j = i;
        while j < input.len() && is_space(input[j]) {
            j += 1;
        }
        if input.get(j) != Some(&b'=') {
            attrs.push((key, String::new()));
            continue;
        }
        i = j + 1;
        while i < input.len() && is_space(input[i]) {
            i += 1;
        }

        let value = match *input.get(i)? {
            quote @ (b'"' | b'\'') => {
                let len = input[i + 1..].iter().position(|&b| b == quote)?;
                let value = &input[i + 1..i + 1 + len];
                i += len + 2;
                value
            }
            _ => {
                let start = i;
                while i < input.len() && !is_space(input[i]) && input[i] != b'>' {
                    i += 1;
                }
                &input[start..i]
            }
        };
        attrs.push((key, unescape(&String::from_utf8_lossy(value))));
    }

    Some((
        i,
        TokenKind::StartTag {
            name,
            attrs,
            self_closing,
        },
    ))
}

/// Named references that show up in generated attribute values
const NAMED_REFS: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{a0}'),
];

/// Longest reference body worth looking at (`#x10FFFF`)
const MAX_REF_LEN: usize = 8;

/// Decode character references in an attribute value.
///
/// Numeric references (`&#46;`, `&#x2E;`) and a few common named ones are
/// decoded; anything else, including a reference without its closing
/// `;`, is kept literally.
fn unescape(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest[1..]
            .find(';')
            .filter(|&end| end <= MAX_REF_LEN)
            .and_then(|end| decode_ref(&rest[1..1 + end]).map(|c| (c, end + 2)));
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_ref(body: &str) -> Option<char> {
    let code = match body.strip_prefix('#') {
        Some(num) => match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        },
        None => {
            return NAMED_REFS
                .iter()
                .find(|(name, _)| *name == body)
                .map(|(_, c)| *c);
        }
    };
    char::from_u32(code)
}
