use regex::Regex;
use std::sync::LazyLock;

// [[fill]align][width][.precision][type]
static FORMAT_SPEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?P<fill>.)?(?P<align>[<>^]))?(?P<width>\d+)?(?:\.(?P<precision>\d+))?(?P<kind>[sd])?$")
        .unwrap_or_else(|e| panic!("format spec pattern is invalid: {e}"))
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
    Center,
}

/// Width, alignment and truncation of one rendered field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormatSpec {
    pub fill: Option<char>,
    pub align: Option<Align>,
    pub width: Option<usize>,
    pub precision: Option<usize>,
}

impl FormatSpec {
    pub fn parse(spec: &str) -> Result<Self, String> {
        let captures = FORMAT_SPEC
            .captures(spec)
            .ok_or_else(|| format!("unsupported format spec '{spec}'"))?;

        let align = captures.name("align").map(|m| match m.as_str() {
            "<" => Align::Left,
            ">" => Align::Right,
            _ => Align::Center,
        });
        let fill = captures.name("fill").and_then(|m| m.as_str().chars().next());
        let width = captures
            .name("width")
            .map(|m| m.as_str().parse::<usize>())
            .transpose()
            .map_err(|e| format!("invalid width in '{spec}': {e}"))?;
        let precision = captures
            .name("precision")
            .map(|m| m.as_str().parse::<usize>())
            .transpose()
            .map_err(|e| format!("invalid precision in '{spec}': {e}"))?;

        Ok(Self {
            fill,
            align,
            width,
            precision,
        })
    }

    pub fn fill_char(&self) -> char {
        self.fill.unwrap_or(' ')
    }

    /// Effective alignment; numbers default to the right like Python does.
    pub fn alignment(&self, numeric: bool) -> Align {
        self.align
            .unwrap_or(if numeric { Align::Right } else { Align::Left })
    }

    pub fn apply(&self, value: &str, numeric: bool, out: &mut String) {
        let value: String = match self.precision {
            Some(precision) => value.chars().take(precision).collect(),
            None => value.to_string(),
        };
        let len = value.chars().count();
        let pad = self.width.map_or(0, |width| width.saturating_sub(len));
        let fill = self.fill_char();

        let (before, after) = match self.alignment(numeric) {
            Align::Left => (0, pad),
            Align::Right => (pad, 0),
            Align::Center => (pad / 2, pad - pad / 2),
        };
        out.extend(std::iter::repeat_n(fill, before));
        out.push_str(&value);
        out.extend(std::iter::repeat_n(fill, after));
    }

    /// Remove the padding `apply` added.
    pub fn strip<'v>(&self, value: &'v str, numeric: bool) -> &'v str {
        if self.width.is_none() {
            return value;
        }
        let fill = self.fill_char();
        match self.alignment(numeric) {
            Align::Left => value.trim_end_matches(fill),
            Align::Right => value.trim_start_matches(fill),
            Align::Center => value.trim_matches(fill),
        }
    }
}
