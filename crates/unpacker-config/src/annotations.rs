//! Turns field doc comments into TOML comments for the generated config file.

use std::any::type_name;

use documented::{Documented, DocumentedFields};
use toml_edit::{Decor, Item, RawString, Table};
use tracing::warn;

use crate::error::{ConfigError, Result};

/// Prepends `docs` to `decor` as `#` comment lines, keeping any prefix already there.
pub fn append_docs_as_toml_comments(decor: &mut Decor, docs: &str) {
    let comments: String = docs
        .lines()
        .map(|line| {
            if line.is_empty() {
                "#\n".to_string()
            } else {
                format!("# {line}\n")
            }
        })
        .collect();

    let existing = decor
        .prefix()
        .and_then(RawString::as_str)
        .unwrap_or_default();
    let prefix = if existing.is_empty() {
        comments
    } else if existing.ends_with('\n') {
        format!("{existing}{comments}")
    } else {
        format!("{existing}\n{comments}")
    };
    decor.set_prefix(prefix);
}

/// Annotates every key of `table` with the matching field docs of `T`.
///
/// The struct-level doc is written as a header, separated from the first key
/// by a blank comment line.
pub fn annotate_toml_table<T>(table: &mut Table) -> Result<()>
where
    T: Documented + DocumentedFields,
{
    let mut first = true;
    for (mut key, item) in table.iter_mut() {
        let name = key.get().to_string();
        let Ok(docs) = T::get_field_docs(&name) else {
            warn!("no documentation for `{name}` on {}", type_name::<T>());
            continue;
        };

        let docs = if first {
            first = false;
            format!("{}\n\n{docs}", T::DOCS)
        } else {
            docs.to_string()
        };

        match item {
            Item::None => return Err(ConfigError::UnexpectedTomlItem(name)),
            Item::Value(_) => append_docs_as_toml_comments(key.leaf_decor_mut(), &docs),
            Item::Table(sub) => append_docs_as_toml_comments(sub.decor_mut(), &docs),
            Item::ArrayOfTables(_) => return Err(ConfigError::UnexpectedTomlItem(name)),
        }
    }
    Ok(())
}
