/// Parser for Cobertura XML coverage reports.
///
/// Cobertura XML structure:
///   <coverage>
///     <sources><source>...</source></sources>
///     <packages>
///       <package name="...">
///         <classes>
///           <class name="..." filename="...">
///             <methods>
///               <method name="...">
///                 <lines><line number="..." hits="..."/></lines>
///               </method>
///             </methods>
///             <lines>
///               <line number="..." hits="..."/>
///             </lines>
///           </class>
///         </classes>
///       </package>
///     </packages>
///   </coverage>
///
/// Several `<class>` elements may share one `filename`; their lines are
/// folded together.
use std::collections::HashMap;
use std::str;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::Result;
use crate::parsers::{LineTally, ParsedFile, Parser};

pub struct CoberturaParser;

impl Parser for CoberturaParser {
    fn parse(&self, input: &[u8]) -> Result<Vec<ParsedFile>> {
        parse_cobertura(input)
    }
}

fn parse_cobertura(input: &[u8]) -> Result<Vec<ParsedFile>> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut tally = LineTally::default();
    let mut buf = Vec::new();

    let mut current_file: Option<String> = None;
    let mut sources: Vec<String> = Vec::new();
    let mut in_source = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        let is_start_event = matches!(&event, Event::Start(_));
        match event {
            Event::Eof => break,
            Event::Start(ref e) | Event::Empty(ref e) => match e.name().as_ref() {
                b"source" => {
                    // <source/> has no text and no End event.
                    if is_start_event {
                        in_source = true;
                    }
                }
                b"class" => {
                    let attrs = attr_map(e);
                    if let Some(filename) = attrs.get("filename") {
                        let path = resolve_source_path(filename, &sources);
                        tally.touch(&path);
                        current_file = Some(path);
                    }
                }
                b"line" => {
                    if let Some(path) = current_file.as_deref() {
                        let attrs = attr_map(e);
                        if let Some(line_number) =
                            attrs.get("number").and_then(|n| n.parse::<u32>().ok())
                        {
                            let hit_count = attrs
                                .get("hits")
                                .and_then(|h| h.parse::<u64>().ok())
                                .unwrap_or(0);
                            tally.hit(path, line_number, hit_count);
                        }
                    }
                }
                _ => {}
            },
            Event::Text(ref e) => {
                if in_source {
                    if let Ok(text) = e.unescape() {
                        sources.push(text.to_string());
                    }
                    in_source = false;
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"source" => in_source = false,
                b"class" => current_file = None,
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    Ok(tally.into_files())
}

/// Resolve a filename against the list of `<source>` prefixes.
///
/// - If the filename is already absolute, return it as-is.
/// - Otherwise, prepend the first non-empty source prefix.
/// - If no non-empty sources exist, return the filename unchanged.
fn resolve_source_path(filename: &str, sources: &[String]) -> String {
    if filename.starts_with('/') {
        return filename.to_string();
    }
    for source in sources {
        let base = source.trim_end_matches('/');
        if !base.is_empty() && base != "." {
            return format!("{}/{}", base, filename);
        }
    }
    filename.to_string()
}

fn attr_map(e: &quick_xml::events::BytesStart) -> HashMap<String, String> {
    e.attributes()
        .filter_map(|a| {
            let attr = a.ok()?;
            let key = str::from_utf8(attr.key.local_name().into_inner())
                .ok()?
                .to_string();
            let value = attr.unescape_value().ok()?.to_string();
            Some((key, value))
        })
        .collect()
}
