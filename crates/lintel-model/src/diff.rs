//! Model diff computation for --output-diff

/// Inputs up to this many line pairs are diffed with a full table; larger
/// ones are split in half recursively so memory stays linear.
const TABLE_LIMIT: usize = 1 << 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op<'a> {
    Same(&'a str),
    Removed(&'a str),
    Added(&'a str),
}

/// Compute a line diff between two TOML strings.
///
/// Lines are prefixed with `"  "` (unchanged), `"- "` (removed) or `"+ "`
/// (added). Removals are listed before the additions that replace them.
pub fn compute_model_diff(before: &str, after: &str) -> String {
    diff_with_limit(before, after, TABLE_LIMIT)
}

fn diff_with_limit(before: &str, after: &str, limit: usize) -> String {
    let before_lines: Vec<&str> = before.lines().collect();
    let after_lines: Vec<&str> = after.lines().collect();

    let mut ops = Vec::with_capacity(before_lines.len().max(after_lines.len()));
    diff_lines(&before_lines, &after_lines, limit, &mut ops);

    let mut output = String::new();
    for op in removals_first(ops) {
        match op {
            Op::Same(line) => output.push_str(&format!("  {}\n", line)),
            Op::Removed(line) => output.push_str(&format!("- {}\n", line)),
            Op::Added(line) => output.push_str(&format!("+ {}\n", line)),
        }
    }
    output
}

/// Hirschberg's divide and conquer over a longest common subsequence
fn diff_lines<'a>(a: &[&'a str], b: &[&'a str], limit: usize, out: &mut Vec<Op<'a>>) {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    out.extend(a[..prefix].iter().map(|&l| Op::Same(l)));
    let (a, b) = (&a[prefix..], &b[prefix..]);

    let suffix = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let tail = &a[a.len() - suffix..];
    let (a, b) = (&a[..a.len() - suffix], &b[..b.len() - suffix]);

    if a.is_empty() {
        out.extend(b.iter().map(|&l| Op::Added(l)));
    } else if b.is_empty() {
        out.extend(a.iter().map(|&l| Op::Removed(l)));
    } else if a.len() == 1 || a.len().saturating_mul(b.len()) <= limit {
        table_diff(a, b, out);
    } else {
        let mid = a.len() / 2;
        let forward = lcs_row(&a[..mid], b, false);
        let backward = lcs_row(&a[mid..], b, true);
        let split = (0..=b.len())
            .max_by_key(|&j| (forward[j] + backward[b.len() - j], std::cmp::Reverse(j)))
            .unwrap_or(0);
        diff_lines(&a[..mid], &b[..split], limit, out);
        diff_lines(&a[mid..], &b[split..], limit, out);
    }

    out.extend(tail.iter().map(|&l| Op::Same(l)));
}

/// Last row of the LCS table of `a` against every prefix of `b` (or, when
/// `reverse` is set, of both reversed), kept in two rows of memory
fn lcs_row(a: &[&str], b: &[&str], reverse: bool) -> Vec<usize> {
    let m = b.len();
    let mut prev = vec![0usize; m + 1];
    let mut curr = vec![0usize; m + 1];
    for i in 0..a.len() {
        let x = if reverse { a[a.len() - 1 - i] } else { a[i] };
        for j in 1..=m {
            let y = if reverse { b[m - j] } else { b[j - 1] };
            curr[j] = if x == y {
                prev[j - 1] + 1
            } else {
                prev[j].max(curr[j - 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev
}

fn table_diff<'a>(a: &[&'a str], b: &[&'a str], out: &mut Vec<Op<'a>>) {
    let (n, m) = (a.len(), b.len());

    // lcs[i][j] = longest common subsequence of a[i..] and b[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < n || j < m {
        if i < n && j < m && a[i] == b[j] {
            out.push(Op::Same(a[i]));
            i += 1;
            j += 1;
        } else if i < n && (j == m || lcs[i + 1][j] >= lcs[i][j + 1]) {
            out.push(Op::Removed(a[i]));
            i += 1;
        } else {
            out.push(Op::Added(b[j]));
            j += 1;
        }
    }
}

/// Within each run of changed lines, move removals ahead of additions
fn removals_first(ops: Vec<Op<'_>>) -> Vec<Op<'_>> {
    let mut result = Vec::with_capacity(ops.len());
    let mut added = Vec::new();
    for op in ops {
        match op {
            Op::Removed(_) => result.push(op),
            Op::Added(_) => added.push(op),
            Op::Same(_) => {
                result.append(&mut added);
                result.push(op);
            }
        }
    }
    result.append(&mut added);
    result
}
