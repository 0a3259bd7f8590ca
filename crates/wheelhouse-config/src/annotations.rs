use std::any::type_name;

use documented::{Documented, DocumentedFields};
use toml_edit::{Decor, Item, RawString, Table};
use tracing::warn;

use crate::error::{ConfigError, Result};

/// Renders `docs` as a block of `#` comment lines.
fn comment_block(docs: &str) -> String {
    docs.lines()
        .map(|line| {
            match line.trim_end() {
                "" => "#\n".to_string(),
                line => format!("# {line}\n"),
            }
        })
        .collect()
}

/// Appends `docs` as TOML comments to the prefix of `decor`.
///
/// An existing prefix that does not end in a blank line is separated from the new block by an
/// empty comment line.
pub fn append_docs_as_toml_comments(decor: &mut Decor, docs: &str) {
    let block = comment_block(docs);
    let prefix = match decor.prefix().and_then(RawString::as_str) {
        Some(existing) if existing.is_empty() || existing.ends_with("\n\n") => {
            format!("{existing}{block}")
        }
        Some(existing) => format!("{existing}#\n{block}"),
        None => block,
    };
    decor.set_prefix(prefix);
}

/// Writes the field docs of `T` above each key of `table`.
///
/// Map-valued options render as sub-tables; their docs go above the table header. A key
/// with no matching field is logged and left bare.
pub fn annotate_toml_table<T>(table: &mut Table, is_root: bool) -> Result<()>
where
    T: Documented + DocumentedFields,
{
    if !is_root {
        append_docs_as_toml_comments(table.decor_mut(), T::DOCS);
    }

    for (mut key, item) in table.iter_mut() {
        let name = key.get().to_string();
        let Ok(docs) = T::get_field_docs(&name) else {
            warn!(
                "no documentation for `{}` in {}",
                name.as_str(),
                type_name::<T>()
            );
            continue;
        };

        match item {
            Item::Value(_) => append_docs_as_toml_comments(key.leaf_decor_mut(), docs),
            Item::Table(sub_table) => append_docs_as_toml_comments(sub_table.decor_mut(), docs),
            Item::ArrayOfTables(_) | Item::None => {
                return Err(ConfigError::UnexpectedTomlItem(name));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn prefix(decor: &Decor) -> &str {
        decor.prefix().and_then(RawString::as_str).unwrap()
    }

    #[test]
    fn test_append_docs_as_toml_comments() {
        let mut decor = Decor::new("", "");
        append_docs_as_toml_comments(&mut decor, "Upload root");
        assert_eq!(prefix(&decor), "# Upload root\n");

        append_docs_as_toml_comments(&mut decor, "Second block");
        assert_eq!(prefix(&decor), "# Upload root\n#\n# Second block\n");
    }

    #[test]
    fn test_append_docs_multiline() {
        let mut decor = Decor::new("", "");
        append_docs_as_toml_comments(&mut decor, "Line 1\n\nLine 2");
        assert_eq!(prefix(&decor), "# Line 1\n#\n# Line 2\n");
    }

    #[test]
    fn test_annotate_toml_document() {
        let config = Config::default_config();
        let doc = config.to_annotated_document().unwrap();
        let rendered = doc.to_string();

        assert!(rendered.contains("# Whether republishing an existing version replaces it."));
        assert!(rendered.contains("allow_version_overwrite = false"));
    }
}
