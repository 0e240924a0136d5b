//! A small textual DEF-like design format (spec §4.L), enough to exercise
//! `legalize` from the command line without a real LEF/DEF reader.
//!
//! One directive per line, blank lines and `#` comments ignored:
//!
//! ```text
//! CORE   x_min y_min x_max y_max
//! SITE   site_width row_height
//! MACRO  name width height_rows [multi] [power=VDD|VSS] [pins=A,B,...]
//! CELL   name macro x y [fixed] [group=name] [pad=left,right]
//! GROUP  name
//! REGION x_min y_min x_max y_max
//! ENDGROUP
//! NET    name term [term ...]
//! ```
//!
//! A net terminal is either `cellname` or `cellname.pinname` (resolved
//! against the cell's macro), or `BLOCK x_min y_min x_max y_max[:placed]`
//! for a chip-boundary pin.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use dp_db::InMemoryDesign;
use dp_geometry::{
    BlockTerminal, Cell, Group, InstTerminal, Macro, MacroId, MacroPin, Net, Power, Rect, Terminal,
};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("{path}:{line}: {message}")]
    Syntax {
        path: String,
        line: usize,
        message: String,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

struct Ctx<'a> {
    path: &'a str,
}

impl Ctx<'_> {
    fn err(&self, line: usize, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            path: self.path.to_string(),
            line,
            message: message.into(),
        }
    }
}

fn parse_dbu(ctx: &Ctx, line: usize, tok: &str) -> Result<i64, ParseError> {
    tok.parse().map_err(|_| ctx.err(line, format!("expected an integer, got `{tok}`")))
}

pub fn parse_design_file(path: impl AsRef<Path>) -> Result<InMemoryDesign, ParseError> {
    let path_ref = path.as_ref();
    let path_str = path_ref.display().to_string();
    let content = fs::read_to_string(path_ref).map_err(|source| ParseError::Io {
        path: path_str.clone(),
        source,
    })?;
    parse_design_str(&content, &path_str)
}

pub fn parse_design_str(content: &str, path: &str) -> Result<InMemoryDesign, ParseError> {
    let ctx = Ctx { path };

    let mut core: Option<Rect> = None;
    let mut site_width: Option<i64> = None;
    let mut row_height: Option<i64> = None;
    let mut macros: Vec<Macro> = Vec::new();
    let mut macro_idx: HashMap<String, MacroId> = HashMap::new();
    let mut cells: Vec<Cell> = Vec::new();
    let mut cell_idx: HashMap<String, usize> = HashMap::new();
    let mut cell_group: Vec<Option<String>> = Vec::new();
    let mut groups: HashMap<String, Group> = HashMap::new();
    let mut group_order: Vec<String> = Vec::new();
    let mut nets: Vec<Net> = Vec::new();

    let mut current_group: Option<String> = None;

    for (i, raw) in content.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let directive = tokens.next().unwrap();
        let rest: Vec<&str> = tokens.collect();

        match directive {
            "CORE" => {
                let [x0, y0, x1, y1] = take4(&ctx, line_no, &rest)?;
                core = Some(Rect::new(
                    parse_dbu(&ctx, line_no, x0)?,
                    parse_dbu(&ctx, line_no, y0)?,
                    parse_dbu(&ctx, line_no, x1)?,
                    parse_dbu(&ctx, line_no, y1)?,
                ));
            }
            "SITE" => {
                if rest.len() != 2 {
                    return Err(ctx.err(line_no, "SITE expects <site_width> <row_height>"));
                }
                site_width = Some(parse_dbu(&ctx, line_no, rest[0])?);
                row_height = Some(parse_dbu(&ctx, line_no, rest[1])?);
            }
            "MACRO" => {
                if rest.len() < 3 {
                    return Err(ctx.err(line_no, "MACRO expects <name> <width> <height_rows> [flags...]"));
                }
                let name = rest[0].to_string();
                let width = parse_dbu(&ctx, line_no, rest[1])?;
                let height_rows: u32 = rest[2]
                    .parse()
                    .map_err(|_| ctx.err(line_no, format!("expected an integer, got `{}`", rest[2])))?;
                let mut is_multi_row = false;
                let mut top_power = None;
                let mut pins = Vec::new();
                for flag in &rest[3..] {
                    if *flag == "multi" {
                        is_multi_row = true;
                    } else if let Some(v) = flag.strip_prefix("power=") {
                        top_power = Some(parse_power(&ctx, line_no, v)?);
                    } else if let Some(v) = flag.strip_prefix("pins=") {
                        pins = v
                            .split(',')
                            .filter(|s| !s.is_empty())
                            .map(|name| MacroPin {
                                name: name.to_string(),
                                geometry: Vec::new(),
                            })
                            .collect();
                    } else {
                        return Err(ctx.err(line_no, format!("unknown MACRO flag `{flag}`")));
                    }
                }
                macro_idx.insert(name.clone(), MacroId(macros.len()));
                macros.push(Macro {
                    name,
                    width,
                    height_rows,
                    top_power,
                    is_multi_row,
                    pins,
                });
            }
            "CELL" => {
                if rest.len() < 4 {
                    return Err(ctx.err(line_no, "CELL expects <name> <macro> <x> <y> [flags...]"));
                }
                let name = rest[0].to_string();
                let macro_name = rest[1];
                let macro_id = *macro_idx
                    .get(macro_name)
                    .ok_or_else(|| ctx.err(line_no, format!("undefined macro `{macro_name}`")))?;
                let x = parse_dbu(&ctx, line_no, rest[2])?;
                let y = parse_dbu(&ctx, line_no, rest[3])?;
                let macro_ = &macros[macro_id.0];
                let mut cell = Cell::new_movable(name.clone(), macro_id, macro_.width, macro_.height_rows as i64, x, y);
                let mut group_name = None;
                for flag in &rest[4..] {
                    if *flag == "fixed" {
                        cell.is_fixed = true;
                        cell.is_placed = true;
                        cell.x_coord = x;
                        cell.y_coord = y;
                    } else if let Some(v) = flag.strip_prefix("group=") {
                        group_name = Some(v.to_string());
                    } else if let Some(v) = flag.strip_prefix("pad=") {
                        let (l, r) = v
                            .split_once(',')
                            .ok_or_else(|| ctx.err(line_no, "pad= expects <left>,<right>"))?;
                        cell.pad_left = l.parse().map_err(|_| ctx.err(line_no, "bad pad left"))?;
                        cell.pad_right = r.parse().map_err(|_| ctx.err(line_no, "bad pad right"))?;
                    } else {
                        return Err(ctx.err(line_no, format!("unknown CELL flag `{flag}`")));
                    }
                }
                cell_idx.insert(name, cells.len());
                cell_group.push(group_name);
                cells.push(cell);
            }
            "GROUP" => {
                if rest.len() != 1 {
                    return Err(ctx.err(line_no, "GROUP expects <name>"));
                }
                let name = rest[0].to_string();
                current_group = Some(name.clone());
                group_order.push(name.clone());
                groups.entry(name.clone()).or_insert_with(|| Group {
                    name,
                    regions: Vec::new(),
                    members: Vec::new(),
                });
            }
            "REGION" => {
                let name = current_group
                    .as_ref()
                    .ok_or_else(|| ctx.err(line_no, "REGION outside of a GROUP block"))?;
                let [x0, y0, x1, y1] = take4(&ctx, line_no, &rest)?;
                let rect = Rect::new(
                    parse_dbu(&ctx, line_no, x0)?,
                    parse_dbu(&ctx, line_no, y0)?,
                    parse_dbu(&ctx, line_no, x1)?,
                    parse_dbu(&ctx, line_no, y1)?,
                );
                groups.get_mut(name).unwrap().regions.push(rect);
            }
            "ENDGROUP" => {
                current_group = None;
            }
            "NET" => {
                if rest.len() < 2 {
                    return Err(ctx.err(line_no, "NET expects <name> <terminal> [terminal ...]"));
                }
                let name = rest[0].to_string();
                let mut terminals = Vec::new();
                for tok in &rest[1..] {
                    terminals.push(parse_terminal(&ctx, line_no, tok, &cell_idx, &cells, &macros)?);
                }
                nets.push(Net { name, terminals });
            }
            other => return Err(ctx.err(line_no, format!("unknown directive `{other}`"))),
        }
    }

    let core = core.ok_or_else(|| ctx.err(0, "missing CORE directive"))?;
    let site_width = site_width.ok_or_else(|| ctx.err(0, "missing SITE directive"))?;
    let row_height = row_height.ok_or_else(|| ctx.err(0, "missing SITE directive"))?;

    let mut design = InMemoryDesign::new(site_width, row_height, core);
    design.macros = macros;

    let mut ordered_groups: Vec<Group> = Vec::new();
    let mut group_pos: HashMap<String, usize> = HashMap::new();
    for name in &group_order {
        if group_pos.contains_key(name) {
            continue;
        }
        group_pos.insert(name.clone(), ordered_groups.len());
        ordered_groups.push(groups.remove(name).unwrap());
    }

    for (i, group_name) in cell_group.into_iter().enumerate() {
        if let Some(gname) = group_name {
            let gpos = *group_pos
                .get(&gname)
                .ok_or_else(|| ctx.err(0, format!("cell references undefined group `{gname}`")))?;
            cells[i].group = Some(dp_geometry::GroupId(gpos));
            ordered_groups[gpos].members.push(dp_geometry::CellId(i));
        }
    }

    design.groups = ordered_groups;
    design.cells = cells;
    design.nets = nets;
    Ok(design)
}

fn take4<'a>(ctx: &Ctx, line: usize, rest: &'a [&'a str]) -> Result<[&'a str; 4], ParseError> {
    if rest.len() != 4 {
        return Err(ctx.err(line, "expected exactly 4 coordinates"));
    }
    Ok([rest[0], rest[1], rest[2], rest[3]])
}

fn parse_power(ctx: &Ctx, line: usize, s: &str) -> Result<Power, ParseError> {
    match s.to_ascii_uppercase().as_str() {
        "VDD" => Ok(Power::Vdd),
        "VSS" => Ok(Power::Vss),
        _ => Err(ctx.err(line, format!("expected VDD or VSS, got `{s}`"))),
    }
}

fn parse_terminal(
    ctx: &Ctx,
    line: usize,
    tok: &str,
    cell_idx: &HashMap<String, usize>,
    cells: &[Cell],
    macros: &[Macro],
) -> Result<Terminal, ParseError> {
    if let Some(rest) = tok.strip_prefix("BLOCK") {
        let rest = rest.trim_start_matches(':');
        let (coords, placed) = match rest.split_once(':') {
            Some((c, flag)) => (c, flag != "unplaced"),
            None => (rest, true),
        };
        let parts: Vec<&str> = coords.split(',').collect();
        if parts.len() != 4 {
            return Err(ctx.err(line, "BLOCK expects x_min,y_min,x_max,y_max"));
        }
        let rect = Rect::new(
            parse_dbu(ctx, line, parts[0])?,
            parse_dbu(ctx, line, parts[1])?,
            parse_dbu(ctx, line, parts[2])?,
            parse_dbu(ctx, line, parts[3])?,
        );
        return Ok(Terminal::Block(BlockTerminal {
            pins: vec![rect],
            is_placed: placed,
        }));
    }

    let (cell_name, pin_name) = match tok.split_once('.') {
        Some((c, p)) => (c, Some(p)),
        None => (tok, None),
    };
    let cell_pos = *cell_idx
        .get(cell_name)
        .ok_or_else(|| ctx.err(line, format!("net references undefined cell `{cell_name}`")))?;
    let pin_index = match pin_name {
        None => None,
        Some(pin_name) => {
            let macro_ = &macros[cells[cell_pos].macro_id.0];
            Some(
                macro_
                    .pins
                    .iter()
                    .position(|p| p.name == pin_name)
                    .ok_or_else(|| ctx.err(line, format!("macro has no pin named `{pin_name}`")))?,
            )
        }
    };
    Ok(Terminal::Instance(InstTerminal {
        cell: dp_geometry::CellId(cell_pos),
        pin_index,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TINY: &str = "\
CORE 0 0 200 40
SITE 10 20
MACRO BUF 20 1 power=VDD pins=A,Z
CELL i0 BUF 10 0
CELL i1 BUF 150 0
NET n0 i0.A i1.Z
";

    #[test]
    fn parses_core_site_macro_cell_net() {
        let d = parse_design_str(TINY, "tiny.dplace").unwrap();
        assert_eq!(d.core, Rect::new(0, 0, 200, 40));
        assert_eq!(d.site_width, 10);
        assert_eq!(d.row_height, 20);
        assert_eq!(d.macros.len(), 1);
        assert_eq!(d.cells.len(), 2);
        assert_eq!(d.nets.len(), 1);
    }

    #[test]
    fn fixed_cells_are_marked_placed_at_their_given_coordinate() {
        let src = "CORE 0 0 200 40\nSITE 10 20\nMACRO M 20 1\nCELL f0 M 0 0 fixed\n";
        let d = parse_design_str(src, "t").unwrap();
        assert!(d.cells[0].is_fixed);
        assert!(d.cells[0].is_placed);
    }

    #[test]
    fn group_membership_is_resolved_from_cell_flags() {
        let src = "\
CORE 0 0 200 40
SITE 10 20
MACRO M 20 1
GROUP g0
REGION 0 0 100 40
ENDGROUP
CELL a M 10 0 group=g0
";
        let d = parse_design_str(src, "t").unwrap();
        assert_eq!(d.groups.len(), 1);
        assert_eq!(d.groups[0].members, vec![dp_geometry::CellId(0)]);
        assert_eq!(d.cells[0].group, Some(dp_geometry::GroupId(0)));
    }

    #[test]
    fn undefined_macro_reference_is_a_syntax_error() {
        let src = "CORE 0 0 200 40\nSITE 10 20\nCELL a NOPE 0 0\n";
        let err = parse_design_str(src, "t").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }

    #[test]
    fn parse_design_file_reads_a_real_path() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut f, TINY.as_bytes()).unwrap();
        let d = parse_design_file(f.path()).unwrap();
        assert_eq!(d.cells.len(), 2);
    }

    #[test]
    fn parse_design_file_reports_io_error_for_a_missing_path() {
        let err = parse_design_file("/nonexistent/dplace/fixture.dplace").unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }
}
