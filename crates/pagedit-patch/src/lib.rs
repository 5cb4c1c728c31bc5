//! Source patching for pagedit.
//!
//! Maps an edit made on a rendered page back onto the source document it
//! came from:
//! - [`locator`] resolves a `(line, column, tag)` position to a byte range
//! - [`block`] finds frontmatter and Markdown blocks
//! - [`markdown`] turns an edited HTML fragment back into Markdown
//! - [`patcher`] applies a batch of edits to one document

pub mod block;
mod error;
pub mod locator;
pub mod markdown;
pub mod patcher;

pub use error::{PatchError, PatchResult};
pub use locator::{find_tag_at_position, is_valid_tag_name, replace_outer_content, TagRange};
pub use markdown::html_to_markdown;
pub use patcher::{patch_document, DocumentKind, PatchEdit, PatchOutcome};
