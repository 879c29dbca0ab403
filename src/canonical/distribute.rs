//! Direct DNF construction for filters with too many variables to enumerate.
//!
//! Conjunctions are distributed over disjunctions term by term, and the term
//! set is kept small as it grows: terms holding a variable and its negation
//! are dropped, terms implied by a smaller one are absorbed, and a literal is
//! struck from a term whenever a sibling term makes it redundant
//! (`c & x | c & d & !x` becomes `c & x | c & d`).

use super::Expr;

/// Literals sorted by variable, each variable at most once.
pub(super) type Term = Vec<(usize, bool)>;

pub(super) fn terms(expr: &Expr) -> Vec<Term> {
    match expr {
        Expr::Literal(variable, positive) => vec![vec![(*variable, *positive)]],
        Expr::Or(children) => simplify(children.iter().flat_map(terms).collect()),
        Expr::And(children) => children.iter().fold(vec![vec![]], |product, child| {
            let child = terms(child);
            simplify(
                product
                    .iter()
                    .flat_map(|left| child.iter().filter_map(move |right| conjoin(left, right)))
                    .collect(),
            )
        }),
    }
}

/// `None` when the two terms disagree on some variable.
fn conjoin(left: &Term, right: &Term) -> Option<Term> {
    let mut term = Vec::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        let (a, b) = (left[i], right[j]);
        if a.0 < b.0 {
            term.push(a);
            i += 1;
        } else if b.0 < a.0 {
            term.push(b);
            j += 1;
        } else if a.1 == b.1 {
            term.push(a);
            i += 1;
            j += 1;
        } else {
            return None;
        }
    }
    term.extend_from_slice(&left[i..]);
    term.extend_from_slice(&right[j..]);
    Some(term)
}

fn implies(smaller: &Term, larger: &Term) -> bool {
    smaller.len() <= larger.len() && smaller.iter().all(|literal| larger.contains(literal))
}

/// Literal of `term` made redundant by `other`: `other` is `c & x` and `term`
/// holds `c` and `!x`.
fn redundant_literal(other: &Term, term: &Term) -> Option<usize> {
    let mut flipped = None;
    for (variable, positive) in other {
        match term.iter().position(|(known, _)| known == variable) {
            Some(position) if term[position].1 == *positive => {}
            Some(position) if flipped.is_none() => flipped = Some(position),
            _ => return None,
        }
    }
    flipped
}

fn simplify(mut terms: Vec<Term>) -> Vec<Term> {
    loop {
        terms.sort_unstable_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        terms.dedup();

        let mut kept: Vec<Term> = Vec::with_capacity(terms.len());
        for term in terms {
            if !kept.iter().any(|smaller| implies(smaller, &term)) {
                kept.push(term);
            }
        }

        let mut changed = false;
        for i in 0..kept.len() {
            for j in 0..kept.len() {
                if i == j {
                    continue;
                }
                if let Some(position) = redundant_literal(&kept[j], &kept[i]) {
                    kept[i].remove(position);
                    changed = true;
                }
            }
        }

        if !changed {
            return kept;
        }
        terms = kept;
    }
}
