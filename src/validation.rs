use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::{NnueErr, Result};

/// Two scores agree when they are both ties or share the same sign.
pub fn scores_agree(a: i64, b: i64) -> bool {
    if a != 0 || b != 0 {
        a.signum() * b.signum() > 0
    } else {
        true
    }
}

/// A pair of lines whose scores don't agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    /// 1 based.
    pub line: usize,
    pub left: i64,
    pub right: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub left: PathBuf,
    pub right: PathBuf,
    pub compared: usize,
    pub mismatches: Vec<Mismatch>,
    /// Lines of the longer file without a counterpart.
    pub unpaired: usize,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty() && self.unpaired == 0
    }
}

/// Reads the second whitespace separated field of every non blank line as an integer score.
pub fn read_scores(path: &Path) -> Result<Vec<i64>> {
    let raw = fs::read_to_string(path)?;

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            line.split_whitespace()
                .nth(1)
                .and_then(|score| score.parse().ok())
                .ok_or_else(|| NnueErr::MalformedScore {
                    path: path.to_path_buf(),
                    line: i + 1,
                })
        })
        .collect()
}

/// Writes one `<label>\t<score>` line per position.
pub fn write_scores<W: Write>(mut writer: W, labels: &[i64], scores: &[i64]) -> Result<()> {
    if labels.len() != scores.len() {
        return Err(NnueErr::LengthMismatch {
            what: "scores",
            got: scores.len(),
            expected: labels.len(),
        });
    }

    for (label, score) in labels.iter().zip(scores) {
        writeln!(writer, "{label}\t{score}")?;
    }

    writer.flush()?;
    Ok(())
}

/// Compares two score files line by line.
pub fn validate_files(left: &Path, right: &Path) -> Result<ValidationReport> {
    let a = read_scores(left)?;
    let b = read_scores(right)?;

    let mismatches = a
        .iter()
        .zip(&b)
        .enumerate()
        .filter(|&(_, (&l, &r))| !scores_agree(l, r))
        .map(|(i, (&l, &r))| Mismatch {
            line: i + 1,
            left: l,
            right: r,
        })
        .collect();

    Ok(ValidationReport {
        left: left.to_path_buf(),
        right: right.to_path_buf(),
        compared: a.len().min(b.len()),
        mismatches,
        unpaired: a.len().abs_diff(b.len()),
    })
}
