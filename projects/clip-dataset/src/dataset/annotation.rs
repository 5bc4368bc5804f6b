// Annotation parser: one XML document per video -> clip records
//
// Expected layout:
//   <annotation>
//     <filename>day/clip1.mp4</filename>
//     <header><time>day</time></header>
//     <object>
//       <action>
//         <actionname>Assault</actionname>
//         <frame><start>10</start><end>42</end></frame>
//       </action>
//     </object>
//   </annotation>

use crate::dataset::types::{ClipRecord, Domain};
use crate::error::{PrepError, PrepResult};
use roxmltree::{Document, Node};
use std::fs;
use std::path::Path;

/// Clips extracted from a single annotation source.
#[derive(Debug, Clone)]
pub struct ParsedAnnotation {
    pub video_path: String,
    pub domain: Domain,
    pub clips: Vec<ClipRecord>,
    /// Intervals skipped for missing fields, non-integer bounds or `start > end`
    pub dropped_intervals: usize,
}

pub fn parse_annotation_file(path: &Path) -> PrepResult<ParsedAnnotation> {
    let text = fs::read_to_string(path).map_err(|e| PrepError::AnnotationMalformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_annotation(&text, path)
}

/// Parses one annotation document. `source` is only used in errors and logs.
pub fn parse_annotation(xml: &str, source: &Path) -> PrepResult<ParsedAnnotation> {
    let doc = Document::parse(xml).map_err(|e| PrepError::AnnotationMalformed {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })?;
    let root = doc.root_element();

    let video_path = child_text(root, "filename")
        .map(|t| t.trim().replace('\\', "/"))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| PrepError::MissingFilename(source.to_path_buf()))?;

    let time_hint = child(root, "header")
        .and_then(|header| child_text(header, "time"))
        .map(|t| t.trim().to_lowercase());
    let domain = infer_domain(&video_path, time_hint.as_deref());
    if domain == Domain::Unknown {
        tracing::warn!("Domain unknown for {} ({})", video_path, source.display());
    }

    let mut clips = Vec::new();
    let mut dropped_intervals = 0;

    for object in children(root, "object") {
        for action in children(object, "action") {
            let label = match child_text(action, "actionname").map(str::trim) {
                Some(name) if !name.is_empty() => name.to_lowercase(),
                _ => continue,
            };

            for frame in children(action, "frame") {
                match parse_interval(frame) {
                    Ok((start_frame, end_frame)) => clips.push(ClipRecord {
                        video_path: video_path.clone(),
                        start_frame,
                        end_frame,
                        action_label: label.clone(),
                        domain,
                    }),
                    Err(reason) => {
                        tracing::debug!(
                            "Skipping interval of '{}' in {}: {}",
                            label,
                            source.display(),
                            reason
                        );
                        dropped_intervals += 1;
                    }
                }
            }
        }
    }

    Ok(ParsedAnnotation {
        video_path,
        domain,
        clips,
        dropped_intervals,
    })
}

/// Domain precedence: first directory of the filename, then the header time
/// tag, then `Unknown`.
pub fn infer_domain(video_path: &str, time_hint: Option<&str>) -> Domain {
    let from_path = video_path
        .rsplit_once('/')
        .and_then(|(dir, _)| dir.split('/').next())
        .and_then(Domain::parse_valid);

    from_path
        .or_else(|| time_hint.and_then(Domain::parse_valid))
        .unwrap_or(Domain::Unknown)
}

#[derive(Debug, thiserror::Error)]
enum IntervalSkip {
    #[error("<{0}> missing")]
    Missing(&'static str),
    #[error("<{0}> is not an integer: '{1}'")]
    NotInteger(&'static str, String),
    #[error(transparent)]
    Range(PrepError),
}

fn parse_interval(frame: Node) -> Result<(u64, u64), IntervalSkip> {
    let bound = |name: &'static str| -> Result<i64, IntervalSkip> {
        let node = child(frame, name).ok_or(IntervalSkip::Missing(name))?;
        let text = node.text().unwrap_or("").trim();
        text.parse::<i64>()
            .map_err(|_| IntervalSkip::NotInteger(name, text.to_string()))
    };

    let start = bound("start")?;
    let end = bound("end")?;
    if start < 0 || start > end {
        return Err(IntervalSkip::Range(PrepError::ClipRangeInvalid { start, end }));
    }
    Ok((start as u64, end as u64))
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |n| n.has_tag_name(name))
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name).and_then(|n| n.text())
}
