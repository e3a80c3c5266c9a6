//! Word-wrapping of rules and flavor text inside the card's text box.

use std::sync::LazyLock;

use regex::Regex;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{[^}]+\}|\S+|\n").expect("token regex")
});

/// Fonts shipped in `assets/fonts/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFace {
    Title,
    Body,
    Bullet,
    Italic,
}

impl FontFace {
    pub const ALL: [FontFace; 4] = [
        FontFace::Title,
        FontFace::Body,
        FontFace::Bullet,
        FontFace::Italic,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            FontFace::Title => "planewalker.otf",
            FontFace::Body => "garamond.ttf",
            FontFace::Bullet => "garamondbullet.ttf",
            FontFace::Italic => "garamonditalic.ttf",
        }
    }

    /// Average advance of one glyph as a fraction of the font size.
    /// Slightly overestimated so wrapped text never overruns the box.
    fn char_width_ratio(&self) -> f32 {
        match self {
            FontFace::Title => 0.55,
            FontFace::Body | FontFace::Bullet => 0.46,
            FontFace::Italic => 0.44,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub face: FontFace,
    pub size: f32,
}

impl TextStyle {
    pub const fn new(face: FontFace, size: f32) -> Self {
        Self { face, size }
    }

    /// Estimated rendered width of `text` in pixels.
    pub fn width(&self, text: &str) -> i32 {
        let glyphs = text.chars().count() as f32;
        (glyphs * self.size * self.face.char_width_ratio()).ceil() as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Break,
    /// Single-character `{X}` symbol
    Symbol(char),
    Word(&'a str),
}

/// Split text into words, line breaks and `{X}` symbols.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| {
            let raw = m.as_str();
            if raw == "\n" {
                return Token::Break;
            }
            let mut inner = raw
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix('}'))
                .map(str::chars)
                .into_iter()
                .flatten();
            match (inner.next(), inner.next()) {
                (Some(c), None) if c.is_ascii_alphanumeric() => Token::Symbol(c),
                _ => Token::Word(raw),
            }
        })
        .collect()
}

/// Something placed by a [`TextFlow`], in card pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Placed {
    Text {
        text: String,
        x: i32,
        y: i32,
        style: TextStyle,
    },
    Icon {
        icon: String,
        x: i32,
        y: i32,
    },
}

/// Left-aligned flow that wraps when an item would cross `max_x`.
#[derive(Debug, Clone)]
pub struct TextFlow {
    x_start: i32,
    max_x: i32,
    line_height: i32,
    x: i32,
    y: i32,
    items: Vec<Placed>,
}

impl TextFlow {
    pub fn new(x_start: i32, y_start: i32, max_x: i32, line_height: i32) -> Self {
        Self {
            x_start,
            max_x,
            line_height,
            x: x_start,
            y: y_start,
            items: Vec::new(),
        }
    }

    /// Top of the current line.
    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn line_break(&mut self) {
        self.x = self.x_start;
        self.y += self.line_height;
    }

    pub fn word(&mut self, text: &str, style: TextStyle) {
        let width = style.width(text);
        if self.x + width > self.max_x {
            self.line_break();
        }
        self.items.push(Placed::Text {
            text: text.to_string(),
            x: self.x,
            y: self.y,
            style,
        });
        self.x += width + style.width(" ");
    }

    /// Inline icon; wrapping moves down by the icon's own height.
    pub fn icon(&mut self, icon: String, width: u32, height: u32) {
        let (width, height) = (width as i32, height as i32);
        if self.x + width > self.max_x {
            self.x = self.x_start;
            self.y += height;
        }
        self.items.push(Placed::Icon {
            icon,
            x: self.x,
            y: self.y,
        });
        self.x += width;
    }

    /// Flow every word of `text`; `{X}` symbols are left to `on_symbol`,
    /// which returns `false` to print the symbol as a plain word instead.
    pub fn paragraph(
        &mut self,
        text: &str,
        style: TextStyle,
        mut on_symbol: impl FnMut(&mut Self, char) -> bool,
    ) {
        for token in tokenize(text) {
            match token {
                Token::Break => self.line_break(),
                Token::Symbol(symbol) => {
                    if !on_symbol(self, symbol) {
                        self.word(&format!("{{{}}}", symbol), style);
                    }
                }
                Token::Word(word) => self.word(word, style),
            }
        }
    }

    pub fn into_items(self) -> Vec<Placed> {
        self.items
    }
}
