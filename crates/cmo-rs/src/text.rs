//! Compact text format for annotated graphs, used by tests and debug dumps.
//!
//! ```text
//! graph @chain {
//!   %w  = const out[256] weights[256]
//!   %n1 = conv(%w.0 eol visit=[1]) engine=aicore stream=0 rw=0 out[1024] ws[512]
//!   %n2 = relu(%n1.0 eol visit=[2] size=1024) engine=aicore stream=0 rw=1 out[?]
//!   reuse %n1.ws0 -> %n2.out0
//! }
//! ```
//!
//! Nodes are listed in schedule order. Inputs are `%producer.<output>` or `_`
//! for graph inputs, followed by optional `eol`, `eol=false`, `visit=[..]` and
//! `size=N`. Node attributes are `engine=`, `stream=`, `rw=`, `out[..]` (`?` for
//! an unknown size), `ws[..]` and `weights[..]`. `reuse` lines may reference
//! nodes defined later and are applied in order, nearest reuser first.

use thiserror::Error;

use crate::error::GraphError;
use crate::graph::{Graph, ImplyType, NodeBuilder, NodeId, ObjectKind, ReuseEntry, TensorDesc};

/// Errors raised while parsing the text graph format.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TextGraphError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: {source}")]
    Graph {
        line: usize,
        #[source]
        source: GraphError,
    },
}

fn syntax(line: usize, message: impl Into<String>) -> TextGraphError {
    TextGraphError::Syntax {
        line,
        message: message.into(),
    }
}

/// Parses a graph described in the text format.
///
/// # Example
/// ```
/// use cmo_rs::text::parse_graph;
///
/// let graph = parse_graph(r#"
/// graph @pair {
///   %a = conv engine=aicore stream=0 rw=0 out[64]
///   %b = relu(%a.0 eol visit=[1]) engine=aicore stream=0 rw=1 out[64]
/// }
/// "#).expect("valid graph");
/// assert_eq!(graph.name(), "pair");
/// assert_eq!(graph.len(), 2);
/// ```
pub fn parse_graph(src: &str) -> Result<Graph, TextGraphError> {
    let mut graph: Option<Graph> = None;
    let mut closed = false;
    let mut reuses: Vec<(usize, &str)> = Vec::new();

    for (index, raw) in src.lines().enumerate() {
        let line_no = index + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        if closed {
            return Err(syntax(line_no, "unexpected content after closing `}`"));
        }
        let Some(current) = graph.as_mut() else {
            graph = Some(parse_header(line, line_no)?);
            continue;
        };
        if line == "}" {
            closed = true;
        } else if let Some(rest) = line.strip_prefix("reuse") {
            reuses.push((line_no, rest.trim()));
        } else {
            parse_node(current, line, line_no)?;
        }
    }

    let mut graph = graph.ok_or_else(|| syntax(1, "input is empty"))?;
    if !closed {
        return Err(syntax(src.lines().count(), "missing `}` to end graph body"));
    }
    for (line_no, reuse) in reuses {
        apply_reuse(&mut graph, reuse, line_no)?;
    }
    Ok(graph)
}

/// Parses `src`, panicking with the parse error. Intended for fixtures.
#[macro_export]
macro_rules! cmo_graph {
    ($src:expr) => {
        $crate::text::parse_graph($src)
            .unwrap_or_else(|err| panic!("invalid cmo graph text: {err}"))
    };
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_header(line: &str, line_no: usize) -> Result<Graph, TextGraphError> {
    let header = line
        .strip_prefix("graph")
        .ok_or_else(|| syntax(line_no, "graph header must start with `graph`"))?;
    let name = header
        .trim()
        .strip_suffix('{')
        .ok_or_else(|| syntax(line_no, "missing `{` to start graph body"))?
        .trim();
    let name = name.strip_prefix('@').unwrap_or(name).trim();
    if name.is_empty() {
        return Err(syntax(line_no, "graph name cannot be empty"));
    }
    Ok(Graph::new(name))
}

fn parse_node(graph: &mut Graph, line: &str, line_no: usize) -> Result<(), TextGraphError> {
    let (lhs, rhs) = line
        .split_once('=')
        .ok_or_else(|| syntax(line_no, "node must be `%name = op ...`"))?;
    let name = parse_value_name(lhs.trim(), line_no)?;
    let rhs = rhs.trim();

    let op_end = rhs
        .find(|c: char| c == '(' || c.is_whitespace())
        .unwrap_or(rhs.len());
    let op_type = &rhs[..op_end];
    if op_type.is_empty() {
        return Err(syntax(line_no, format!("node `{name}` has no op type")));
    }
    let mut builder = NodeBuilder::new(name, op_type);

    let mut rest = &rhs[op_end..];
    if rest.starts_with('(') {
        let close = find_matching(rest, 0)
            .ok_or_else(|| syntax(line_no, "missing `)` to close input list"))?;
        for input in split_top_level(&rest[1..close], |c| c == ',') {
            builder = parse_input(graph, builder, input, line_no)?;
        }
        rest = &rest[close + 1..];
    }

    for attr in split_top_level(rest, char::is_whitespace) {
        builder = parse_node_attr(builder, attr, line_no)?;
    }

    graph
        .insert(builder)
        .map(|_| ())
        .map_err(|source| TextGraphError::Graph {
            line: line_no,
            source,
        })
}

fn parse_input(
    graph: &Graph,
    builder: NodeBuilder,
    input: &str,
    line_no: usize,
) -> Result<NodeBuilder, TextGraphError> {
    let tokens = split_top_level(input, char::is_whitespace);
    let Some((source, attrs)) = tokens.split_first() else {
        return Err(syntax(line_no, "empty input"));
    };

    let mut desc = TensorDesc::new();
    for attr in attrs {
        match attr.split_once('=') {
            None if *attr == "eol" => desc.end_of_mem_lifecycle = Some(true),
            Some(("eol", value)) => {
                desc.end_of_mem_lifecycle = Some(parse_bool(value, line_no)?)
            }
            Some(("visit", value)) => {
                desc.data_visit_distance = Some(parse_list(value, line_no, parse_number)?)
            }
            Some(("size", value)) => desc.size = Some(parse_number(value, line_no)?),
            _ => return Err(syntax(line_no, format!("unknown input attribute `{attr}`"))),
        }
    }

    if *source == "_" {
        return Ok(builder.graph_input(desc));
    }
    let (producer, output) = match source.split_once('.') {
        Some((producer, output)) => (producer, parse_number(output, line_no)?),
        None => (*source, 0),
    };
    let producer_name = parse_value_name(producer, line_no)?;
    let producer = graph
        .find(producer_name)
        .ok_or_else(|| syntax(line_no, format!("unknown producer `%{producer_name}`")))?;
    Ok(builder.input_from(producer, output, desc))
}

fn parse_node_attr(
    builder: NodeBuilder,
    attr: &str,
    line_no: usize,
) -> Result<NodeBuilder, TextGraphError> {
    if let Some((key, value)) = attr.split_once('=') {
        return match key {
            "engine" => ImplyType::parse(value)
                .map(|imply_type| builder.imply_type(imply_type))
                .ok_or_else(|| syntax(line_no, format!("unknown engine `{value}`"))),
            "stream" => Ok(builder.stream(parse_number(value, line_no)?)),
            "rw" => Ok(builder.read_write_index(parse_number(value, line_no)?)),
            _ => Err(syntax(line_no, format!("unknown node attribute `{key}`"))),
        };
    }

    let open = attr
        .find('[')
        .ok_or_else(|| syntax(line_no, format!("unknown node attribute `{attr}`")))?;
    let (key, list) = attr.split_at(open);
    let mut builder = builder;
    match key {
        "out" => {
            for size in parse_list(list, line_no, parse_optional_size)? {
                builder = builder.output(TensorDesc { size, ..TensorDesc::default() });
            }
        }
        "ws" => {
            for size in parse_list(list, line_no, parse_number)? {
                builder = builder.workspace(size);
            }
        }
        "weights" => {
            for size in parse_list(list, line_no, parse_number)? {
                builder = builder.weight(size);
            }
        }
        _ => return Err(syntax(line_no, format!("unknown node attribute `{key}`"))),
    }
    Ok(builder)
}

/// `%a.ws0 -> %b.out1`
fn apply_reuse(graph: &mut Graph, reuse: &str, line_no: usize) -> Result<(), TextGraphError> {
    let (owner, reuser) = reuse
        .split_once("->")
        .ok_or_else(|| syntax(line_no, "reuse must be `reuse %a.slot -> %b.slot`"))?;
    let (owner, kind, index) = parse_slot_ref(graph, owner.trim(), line_no)?;
    let (node, reuser_kind, reuser_index) = parse_slot_ref(graph, reuser.trim(), line_no)?;
    graph
        .add_mem_reuse(
            owner,
            kind,
            index,
            ReuseEntry {
                node,
                kind: reuser_kind,
                index: reuser_index,
            },
        )
        .map_err(|source| TextGraphError::Graph {
            line: line_no,
            source,
        })
}

fn parse_slot_ref(
    graph: &Graph,
    text: &str,
    line_no: usize,
) -> Result<(NodeId, ObjectKind, u32), TextGraphError> {
    let (name, slot) = text.split_once('.').ok_or_else(|| {
        syntax(
            line_no,
            format!("slot reference `{text}` needs `.out<N>` or `.ws<N>`"),
        )
    })?;
    let name = parse_value_name(name, line_no)?;
    let node = graph
        .find(name)
        .ok_or_else(|| syntax(line_no, format!("unknown node `%{name}`")))?;
    let (kind, index) = if let Some(index) = slot.strip_prefix("out") {
        (ObjectKind::Output, index)
    } else if let Some(index) = slot.strip_prefix("ws") {
        (ObjectKind::Workspace, index)
    } else {
        return Err(syntax(line_no, format!("unknown slot `{slot}`")));
    };
    Ok((node, kind, parse_number(index, line_no)?))
}

fn parse_value_name(text: &str, line_no: usize) -> Result<&str, TextGraphError> {
    let name = text
        .strip_prefix('%')
        .ok_or_else(|| syntax(line_no, format!("value `{text}` must start with `%`")))?;
    if name.is_empty() {
        return Err(syntax(line_no, "value name cannot be empty"));
    }
    Ok(name)
}

fn parse_number<T: std::str::FromStr>(text: &str, line_no: usize) -> Result<T, TextGraphError> {
    text.trim()
        .parse()
        .map_err(|_| syntax(line_no, format!("invalid number `{}`", text.trim())))
}

fn parse_optional_size(text: &str, line_no: usize) -> Result<Option<i64>, TextGraphError> {
    if text.trim() == "?" {
        return Ok(None);
    }
    parse_number(text, line_no).map(Some)
}

fn parse_bool(text: &str, line_no: usize) -> Result<bool, TextGraphError> {
    match text.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(syntax(line_no, format!("invalid bool `{other}`"))),
    }
}

fn parse_list<T>(
    text: &str,
    line_no: usize,
    parse_item: fn(&str, usize) -> Result<T, TextGraphError>,
) -> Result<Vec<T>, TextGraphError> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| syntax(line_no, format!("expected `[...]`, found `{text}`")))?;
    split_top_level(inner, |c| c == ',')
        .into_iter()
        .map(|item| parse_item(item, line_no))
        .collect()
}

fn find_matching(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, ch) in text[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits on separator characters outside of `(...)` and `[...]`, dropping empty pieces.
fn split_top_level(text: &str, is_separator: impl Fn(char) -> bool) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (offset, ch) in text.char_indices() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            _ if depth == 0 && is_separator(ch) => {
                pieces.push(text[start..offset].trim());
                start = offset + ch.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push(text[start..].trim());
    pieces.retain(|piece| !piece.is_empty());
    pieces
}
