//! Markdown export of a crawl tree
//!
//! This module renders a root document and everything crawled below it as a
//! human-readable markdown document, one section per document.

use crate::storage::{DocumentRecord, Storage, SummaryRecord};
use crate::Result;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A document with its summary and the documents discovered from it
#[derive(Debug, Clone)]
pub struct ExportNode {
    pub document: DocumentRecord,
    pub summary: Option<SummaryRecord>,
    pub children: Vec<ExportNode>,
}

impl ExportNode {
    /// Number of documents in this subtree, including this one
    pub fn document_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(ExportNode::document_count)
            .sum::<usize>()
    }
}

/// Loads the crawl tree rooted at `root`
pub fn load_tree(storage: &dyn Storage, root: DocumentRecord) -> Result<ExportNode> {
    let summary = storage.get_summary(root.id)?;
    let children = storage
        .get_children(root.id)?
        .into_iter()
        .map(|child| load_tree(storage, child))
        .collect::<Result<Vec<_>>>()?;

    Ok(ExportNode {
        document: root,
        summary,
        children,
    })
}

/// Writes the markdown export of a crawl tree
///
/// # Returns
///
/// * `Ok(usize)` - Number of documents written
/// * `Err(DigestError)` - Failed to write the file
pub fn write_markdown_export(tree: &ExportNode, output_path: &Path) -> Result<usize> {
    let markdown = format_markdown_tree(tree);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(tree.document_count())
}

/// Formats a crawl tree as markdown
pub fn format_markdown_tree(tree: &ExportNode) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Digest: {}\n\n", display_title(&tree.document)));
    md.push_str(&format!("- **Root URL**: {}\n", tree.document.url));
    md.push_str(&format!("- **Documents**: {}\n", tree.document_count()));
    md.push_str(&format!("- **Created**: {}\n\n", tree.document.created_at));

    push_node(&mut md, tree);
    md
}

fn display_title(document: &DocumentRecord) -> &str {
    if document.title.is_empty() {
        &document.url
    } else {
        &document.title
    }
}

fn push_node(md: &mut String, node: &ExportNode) {
    let doc = &node.document;
    let level = (doc.depth as usize + 2).min(6);

    md.push_str(&format!("{} {}\n\n", "#".repeat(level), display_title(doc)));
    md.push_str(&format!("- **URL**: {}\n", doc.url));
    md.push_str(&format!("- **Status**: {}\n", doc.status));
    md.push_str(&format!("- **Depth**: {}\n", doc.depth));
    if let Some(error) = &doc.error_message {
        md.push_str(&format!("- **Error**: {}\n", error));
    }
    md.push('\n');

    match &node.summary {
        Some(summary) => {
            md.push_str(&summary.text);
            md.push_str(&format!("\n\n_Summarized by {}_\n\n", summary.model_used));
        }
        None => md.push_str("_No summary._\n\n"),
    }

    for child in &node.children {
        push_node(md, child);
    }
}
