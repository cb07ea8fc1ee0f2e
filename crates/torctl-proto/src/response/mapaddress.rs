use torctl_wire::ReplyMessage;

use crate::error::{OperationFailed, ProtoError};

/// The result of a `MAPADDRESS` command: every mapping that was applied.
///
/// Tor's wire protocol guarantees one status code per reply (spec.md
/// §4.2), so a single `MAPADDRESS` call is all-or-nothing at this layer:
/// it either applies every requested mapping or fails as a whole with
/// [`OperationFailed`]. Callers that need per-mapping partial success
/// (spec.md §9 Open Question (a)) issue one `MAPADDRESS` per address pair
/// at the controller façade and aggregate the successes and failures
/// themselves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MapAddressResponse {
    pub applied: Vec<(String, String)>,
}

pub fn parse(msg: &ReplyMessage) -> Result<MapAddressResponse, ProtoError> {
    if msg.code() != 250 {
        return Err(OperationFailed::Failed {
            code: msg.code(),
            message: msg.lines.last().map(|l| l.content.clone()).unwrap_or_default(),
        }
        .into());
    }

    let mut applied = Vec::new();
    for line in &msg.lines {
        if line.content == "OK" {
            continue;
        }
        let (from, to) = line
            .content
            .split_once('=')
            .ok_or_else(|| ProtoError::malformed("MAPADDRESS", format!("line without '=': {:?}", line.content)))?;
        applied.push((from.to_owned(), to.to_owned()));
    }
    Ok(MapAddressResponse { applied })
}

#[cfg(test)]
mod tests {
    use super::*;
    use torctl_wire::Assembler;

    #[test]
    fn all_mappings_succeed() {
        let mut asm = Assembler::new();
        asm.feed("250-1.2.3.4=torproject.org").unwrap();
        asm.feed("250-www.example.com=torproject.org").unwrap();
        let msg = asm.feed("250 OK").unwrap().unwrap();
        let resp = parse(&msg).unwrap();
        assert_eq!(
            resp.applied,
            vec![
                ("1.2.3.4".to_owned(), "torproject.org".to_owned()),
                ("www.example.com".to_owned(), "torproject.org".to_owned()),
            ]
        );
    }

    #[test]
    fn rejected_mapping_fails_as_a_whole() {
        let mut asm = Assembler::new();
        let msg = asm.feed("512 syntax error: invalid address '---'").unwrap().unwrap();
        let err = parse(&msg).unwrap_err();
        assert!(matches!(
            err,
            ProtoError::Operation(OperationFailed::Failed { code: 512, .. })
        ));
    }
}
