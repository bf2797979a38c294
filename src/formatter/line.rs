use super::FormatError;
use crate::parser::{FormatSpec, Placeholder, Segment, Template};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_LINE_FORMAT: &str = "{time:32} {label} {log:8} {name:12} {id:>4} {user:20} {msg}";

/// The named fields a line format may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LineField {
    Time,
    Label,
    Log,
    Name,
    Id,
    User,
    Msg,
    MsgVars,
    DetailMsgs,
    DetailMsgsVars,
}

impl LineField {
    pub const ALL: [LineField; 10] = [
        LineField::Time,
        LineField::Label,
        LineField::Log,
        LineField::Name,
        LineField::Id,
        LineField::User,
        LineField::Msg,
        LineField::MsgVars,
        LineField::DetailMsgs,
        LineField::DetailMsgsVars,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LineField::Time => "time",
            LineField::Label => "label",
            LineField::Log => "log",
            LineField::Name => "name",
            LineField::Id => "id",
            LineField::User => "user",
            LineField::Msg => "msg",
            LineField::MsgVars => "msg_vars",
            LineField::DetailMsgs => "detail_msgs",
            LineField::DetailMsgsVars => "detail_msgs_vars",
        }
    }

    /// Column title used in the console banner.
    pub fn title(&self) -> &'static str {
        match self {
            LineField::Time => "Time",
            LineField::Label => "Label",
            LineField::Log => "Log",
            LineField::Name => "Name",
            LineField::Id => "ID",
            LineField::User => "Userid",
            LineField::Msg => "Message",
            LineField::MsgVars => "Message variables",
            LineField::DetailMsgs => "Detail messages",
            LineField::DetailMsgsVars => "Detail messages variables",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }
}

impl fmt::Display for LineField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSlot {
    pub field: LineField,
    pub spec: FormatSpec,
}

impl Placeholder for FieldSlot {
    fn min_width(&self) -> usize {
        self.spec.width.unwrap_or(0)
    }
}

/// Field values of one record, already converted to text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineValues {
    pub time: String,
    pub label: String,
    pub log: String,
    pub name: String,
    pub id: String,
    pub user: String,
    pub msg: String,
    pub msg_vars: String,
    pub detail_msgs: String,
    pub detail_msgs_vars: String,
}

impl LineValues {
    /// Column titles, with the label title padded to `label_width`.
    pub fn titles(label_width: usize) -> Self {
        Self {
            time: LineField::Time.title().to_string(),
            label: format!("{:<label_width$}", LineField::Label.title()),
            log: LineField::Log.title().to_string(),
            name: LineField::Name.title().to_string(),
            id: LineField::Id.title().to_string(),
            user: LineField::User.title().to_string(),
            msg: LineField::Msg.title().to_string(),
            msg_vars: LineField::MsgVars.title().to_string(),
            detail_msgs: LineField::DetailMsgs.title().to_string(),
            detail_msgs_vars: LineField::DetailMsgsVars.title().to_string(),
        }
    }

    pub fn get(&self, field: LineField) -> &str {
        match field {
            LineField::Time => &self.time,
            LineField::Label => &self.label,
            LineField::Log => &self.log,
            LineField::Name => &self.name,
            LineField::Id => &self.id,
            LineField::User => &self.user,
            LineField::Msg => &self.msg,
            LineField::MsgVars => &self.msg_vars,
            LineField::DetailMsgs => &self.detail_msgs,
            LineField::DetailMsgsVars => &self.detail_msgs_vars,
        }
    }
}

/// A compiled `line_format` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFormat {
    template: Template<FieldSlot>,
}

impl LineFormat {
    pub fn compile(source: &str) -> Result<Self, FormatError> {
        let mut unknown = None;
        let template = Template::compile(source, |inner| {
            let (name, spec) = inner.split_once(':').unwrap_or((inner, ""));
            if name.contains('!') {
                return Err("conversions such as !r are not supported".to_string());
            }
            let Some(field) = LineField::from_name(name.trim()) else {
                unknown = Some(name.trim().to_string());
                return Err(format!("unknown field '{}'", name.trim()));
            };
            Ok(FieldSlot {
                field,
                spec: FormatSpec::parse(spec)?,
            })
        });

        match (template, unknown) {
            (Ok(template), _) => Ok(Self { template }),
            (Err(_), Some(field)) => Err(FormatError::UnknownField(field)),
            (Err(e), None) => Err(FormatError::InvalidLineFormat(e)),
        }
    }

    pub fn source(&self) -> &str {
        self.template.source()
    }

    pub fn fields(&self) -> impl Iterator<Item = LineField> + '_ {
        self.template.placeholders().map(|slot| slot.field)
    }

    pub fn render(&self, values: &LineValues) -> String {
        let mut out = String::with_capacity(self.template.source().len() + 64);
        for segment in self.template.segments() {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(slot) => {
                    let value = values.get(slot.field);
                    slot.spec.apply(value, is_numeric(slot.field, value), &mut out);
                }
            }
        }
        out
    }

    /// The line format applied to the column titles.
    pub fn header(&self) -> String {
        self.render(&LineValues::titles(0))
    }

    /// Recover field values from a rendered line.
    ///
    /// Padding added by width specs is removed. Values truncated by a
    /// precision spec or containing the literal that follows them cannot be
    /// recovered exactly.
    pub fn extract(&self, line: &str) -> BTreeMap<LineField, String> {
        self.template
            .placeholders()
            .zip(self.template.split(line))
            .map(|(slot, raw)| {
                let numeric = slot.field == LineField::Id
                    && raw.trim_matches(slot.spec.fill_char()).parse::<i64>().is_ok();
                (slot.field, slot.spec.strip(raw, numeric).to_string())
            })
            .collect()
    }
}

fn is_numeric(field: LineField, value: &str) -> bool {
    field == LineField::Id && value.parse::<i64>().is_ok()
}
