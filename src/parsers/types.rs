use std::{fmt, str::FromStr};

macro_rules! entry_types {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Dash entry types.
        ///
        /// See <https://kapeli.com/docsets#supportedentrytypes> for the
        /// official list. The string form is what ends up in the `type`
        /// column of the index and inside the anchor names.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum EntryType {
            $($variant),+
        }

        impl EntryType {
            pub const ALL: &'static [EntryType] = &[$(EntryType::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(EntryType::$variant => $name),+
                }
            }
        }

        impl FromStr for EntryType {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(EntryType::$variant),)+
                    other => Err(other.to_string()),
                }
            }
        }
    };
}

entry_types! {
    Annotation => "Annotation",
    Attribute => "Attribute",
    Binding => "Binding",
    Builtin => "Builtin",
    Callback => "Callback",
    Category => "Category",
    Class => "Class",
    Command => "Command",
    Component => "Component",
    Constant => "Constant",
    Constructor => "Constructor",
    Define => "Define",
    Delegate => "Delegate",
    Diagram => "Diagram",
    Directive => "Directive",
    Element => "Element",
    Entry => "Entry",
    Enum => "Enum",
    Environment => "Environment",
    Error => "Error",
    Event => "Event",
    Exception => "Exception",
    Extension => "Extension",
    Field => "Field",
    File => "File",
    Filter => "Filter",
    Framework => "Framework",
    Function => "Function",
    Global => "Global",
    Guide => "Guide",
    Hook => "Hook",
    Instance => "Instance",
    Instruction => "Instruction",
    Interface => "Interface",
    Keyword => "Keyword",
    Library => "Library",
    Literal => "Literal",
    Macro => "Macro",
    Method => "Method",
    Mixin => "Mixin",
    Modifier => "Modifier",
    Module => "Module",
    Namespace => "Namespace",
    Notation => "Notation",
    Object => "Object",
    Operator => "Operator",
    Option => "Option",
    Package => "Package",
    Property => "Property",
    Protocol => "Protocol",
    Provider => "Provider",
    Provisioner => "Provisioner",
    Query => "Query",
    Record => "Record",
    Resource => "Resource",
    Sample => "Sample",
    Section => "Section",
    Service => "Service",
    Setting => "Setting",
    Shortcut => "Shortcut",
    Statement => "Statement",
    Struct => "Struct",
    Style => "Style",
    Subroutine => "Subroutine",
    Tag => "Tag",
    Test => "Test",
    Trait => "Trait",
    Type => "Type",
    Union => "Union",
    Value => "Value",
    Variable => "Variable",
    Word => "Word",
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A documentation entry with a link into the docs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocEntry {
    pub name: String,
    pub kind: EntryType,
    /// File path relative to the documentation root, without fragment
    pub path: String,
    /// In-file fragment; empty when the entry points at the whole file
    pub anchor: String,
}

impl DocEntry {
    /// The path as stored in the index: `path#anchor`, or just `path`.
    pub fn path_with_anchor(&self) -> String {
        if self.anchor.is_empty() {
            self.path.clone()
        } else {
            format!("{}#{}", self.path, self.anchor)
        }
    }

    /// Dash table-of-contents anchor for this entry.
    pub fn dash_anchor(&self) -> String {
        format!(
            r#"<a name="//apple_ref/cpp/{}/{}" class="dashAnchor"></a>"#,
            self.kind,
            urlencoding::encode(&self.name)
        )
    }
}
