//! Plain-text rendering of ranked lists.

use std::io::{self, Write};

use crate::nearest::NearestTokens;
use crate::rare::{Candidate, RareTokenReport};

/// Fixed 4-decimal score with a leading space for non-negative values, so
/// columns line up with negative scores.
#[must_use]
pub fn format_score(x: f32) -> String {
    if x.is_sign_negative() {
        format!("{x:.4}")
    } else {
        format!(" {x:.4}")
    }
}

/// `<score>  id=<id>  <token>` for one rare-token candidate.
#[must_use]
pub fn format_candidate(c: &Candidate) -> String {
    format!("{}  id={:<6}  {:?}", format_score(c.similarity), c.id, c.token)
}

/// Writes one line per candidate.
///
/// # Errors
/// Propagates write failures.
pub fn write_rare<W: Write>(out: &mut W, report: &RareTokenReport) -> io::Result<()> {
    for c in &report.candidates {
        writeln!(out, "{}", format_candidate(c))?;
    }
    Ok(())
}

/// Writes the query breakdown followed by one line per neighbor.
///
/// # Errors
/// Propagates write failures.
pub fn write_nearest<W: Write>(out: &mut W, result: &NearestTokens) -> io::Result<()> {
    writeln!(out, "ids: {:?}", result.query_ids)?;
    writeln!(out, "subtokens: {:?}", result.query_subtokens)?;
    writeln!(out, "nan sims: {}", result.non_finite)?;
    writeln!(out, "nearest:")?;
    for n in &result.neighbors {
        writeln!(out, "{}  {:?}", format_score(n.similarity), n.token)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nearest::Neighbor;

    #[test]
    fn scores_are_sign_padded() {
        assert_eq!(format_score(0.5), " 0.5000");
        assert_eq!(format_score(-0.25), "-0.2500");
        assert_eq!(format_score(-0.0), "-0.0000");
    }

    #[test]
    fn candidate_line_layout() {
        let c = Candidate {
            similarity: -0.12346,
            id: 42,
            token: "→".to_string(),
        };
        assert_eq!(format_candidate(&c), "-0.1235  id=42      \"→\"");
    }

    #[test]
    fn rare_report_writes_one_line_per_candidate() {
        let report = RareTokenReport {
            candidates: vec![
                Candidate {
                    similarity: -0.5,
                    id: 1,
                    token: "@@".to_string(),
                },
                Candidate {
                    similarity: 0.1,
                    id: 7,
                    token: "§".to_string(),
                },
            ],
            centroid_ids: vec![0],
            non_finite: 0,
            rejected_untypeable: 0,
            rejected_non_canonical: 0,
        };
        let mut buf = Vec::new();
        write_rare(&mut buf, &report).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("-0.5000  id=1 "));
    }

    #[test]
    fn nearest_report_layout() {
        let result = NearestTokens {
            query_ids: vec![3, 3],
            query_subtokens: vec!["x".to_string(), "x".to_string()],
            neighbors: vec![Neighbor {
                token: "x".to_string(),
                id: 3,
                similarity: 1.0,
            }],
            non_finite: 2,
        };
        let mut buf = Vec::new();
        write_nearest(&mut buf, &result).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "ids: [3, 3]\nsubtokens: [\"x\", \"x\"]\nnan sims: 2\nnearest:\n 1.0000  \"x\"\n"
        );
    }
}
