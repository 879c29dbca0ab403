//! Two-level boolean minimization (Quine-McCluskey prime implicants, then
//! essential primes and a greedy cover of the remaining minterms).

use itertools::Itertools;
use std::collections::{HashMap, HashSet};

/// A product term. Bit `i` of `dont_care` set means variable `i` is absent;
/// otherwise bit `i` of `bits` tells whether it is asserted or negated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct Cube {
    bits: u64,
    dont_care: u64,
}

impl Cube {
    pub(crate) fn minterm(bits: u64) -> Self {
        Self { bits, dont_care: 0 }
    }

    pub(crate) fn tautology(variables: usize) -> Self {
        Self {
            bits: 0,
            dont_care: full_mask(variables),
        }
    }

    /// `None` when the variable does not take part in the term.
    pub(crate) fn literal(&self, variable: usize) -> Option<bool> {
        let mask = 1 << variable;
        if self.dont_care & mask != 0 {
            None
        } else {
            Some(self.bits & mask != 0)
        }
    }

    /// The asserted and negated variables, in variable order.
    pub(crate) fn term(&self, variables: usize) -> Vec<(usize, bool)> {
        (0..variables)
            .filter_map(|variable| self.literal(variable).map(|asserted| (variable, asserted)))
            .collect()
    }

    fn covers(&self, minterm: u64) -> bool {
        minterm & !self.dont_care == self.bits
    }

    fn literals(&self, variables: usize) -> u32 {
        variables as u32 - self.dont_care.count_ones()
    }
}

fn full_mask(variables: usize) -> u64 {
    if variables >= 64 {
        u64::MAX
    } else {
        (1 << variables) - 1
    }
}

/// Returns a minimal-ish cover of `minterms`, the rows of the truth table
/// over `variables` variables that evaluate to true.
pub(crate) fn minimize(variables: usize, minterms: &[u64]) -> Vec<Cube> {
    if minterms.is_empty() {
        return vec![];
    }
    if variables < 64 && minterms.len() as u64 == 1 << variables {
        return vec![Cube::tautology(variables)];
    }

    let primes = prime_implicants(variables, minterms);
    select_cover(variables, primes, minterms)
}

fn prime_implicants(variables: usize, minterms: &[u64]) -> Vec<Cube> {
    let mut current: HashSet<Cube> = minterms.iter().copied().map(Cube::minterm).collect();
    let mut primes = Vec::new();

    while !current.is_empty() {
        let mut next = HashSet::new();
        let mut merged = HashSet::new();
        for cube in &current {
            for variable in 0..variables {
                let mask = 1 << variable;
                if (cube.bits | cube.dont_care) & mask != 0 {
                    continue;
                }
                let sibling = Cube {
                    bits: cube.bits | mask,
                    dont_care: cube.dont_care,
                };
                if current.contains(&sibling) {
                    next.insert(Cube {
                        bits: cube.bits,
                        dont_care: cube.dont_care | mask,
                    });
                    merged.insert(*cube);
                    merged.insert(sibling);
                }
            }
        }
        primes.extend(current.iter().filter(|cube| !merged.contains(cube)));
        current = next;
    }

    primes.sort_unstable();
    primes
}

fn select_cover(variables: usize, primes: Vec<Cube>, minterms: &[u64]) -> Vec<Cube> {
    let covering: HashMap<u64, Vec<usize>> = minterms
        .iter()
        .map(|minterm| {
            let covering = primes
                .iter()
                .positions(|prime| prime.covers(*minterm))
                .collect();
            (*minterm, covering)
        })
        .collect();

    let mut chosen: Vec<usize> = covering
        .values()
        .filter(|primes| primes.len() == 1)
        .map(|primes| primes[0])
        .sorted_unstable()
        .dedup()
        .collect();
    let mut uncovered: HashSet<u64> = minterms
        .iter()
        .copied()
        .filter(|minterm| !chosen.iter().any(|i| primes[*i].covers(*minterm)))
        .collect();

    while !uncovered.is_empty() {
        let best = primes
            .iter()
            .enumerate()
            .filter(|(i, _)| !chosen.contains(i))
            .map(|(i, prime)| {
                let gain = uncovered.iter().filter(|m| prime.covers(**m)).count();
                (i, gain, prime.literals(variables))
            })
            .filter(|(_, gain, _)| *gain > 0)
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.2.cmp(&a.2)).then_with(|| b.0.cmp(&a.0)));
        let Some((index, _, _)) = best else {
            unreachable!("prime implicants always cover every minterm. This is a bug.");
        };
        uncovered.retain(|minterm| !primes[index].covers(*minterm));
        chosen.push(index);
    }

    chosen.sort_unstable();
    chosen.into_iter().map(|i| primes[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluate(cover: &[Cube], row: u64) -> bool {
        cover.iter().any(|cube| cube.covers(row))
    }

    fn assert_equivalent(variables: usize, minterms: &[u64], cover: &[Cube]) {
        for row in 0..(1u64 << variables) {
            assert_eq!(
                minterms.contains(&row),
                evaluate(cover, row),
                "row {row:b} disagrees"
            );
        }
    }

    #[test]
    fn an_empty_function_has_an_empty_cover() {
        assert!(minimize(3, &[]).is_empty());
    }

    #[test]
    fn a_tautology_is_a_single_empty_term() {
        let cover = minimize(2, &[0, 1, 2, 3]);

        assert_eq!(vec![Cube::tautology(2)], cover);
        assert_eq!(None, cover[0].literal(0));
        assert_eq!(None, cover[0].literal(1));
    }

    #[test]
    fn can_minimize_a_disjunction() {
        // a | b
        let minterms = [0b01, 0b10, 0b11];

        let cover = minimize(2, &minterms);

        assert_eq!(2, cover.len());
        assert!(cover.iter().all(|cube| cube.literals(2) == 1));
        assert_equivalent(2, &minterms, &cover);
    }

    #[test]
    fn can_minimize_a_conjunction() {
        let cover = minimize(3, &[0b111]);

        assert_eq!(vec![Cube::minterm(0b111)], cover);
    }

    #[test]
    fn xor_cannot_be_reduced() {
        let minterms = [0b01, 0b10];

        let cover = minimize(2, &minterms);

        assert_eq!(2, cover.len());
        assert_equivalent(2, &minterms, &cover);
    }

    #[test]
    fn redundant_variables_are_dropped() {
        // (a & b) | (a & !b) == a
        let cover = minimize(2, &[0b01, 0b11]);

        assert_eq!(1, cover.len());
        assert_eq!(Some(true), cover[0].literal(0));
        assert_eq!(None, cover[0].literal(1));
    }

    #[test]
    fn can_cover_a_function_needing_a_non_essential_prime() {
        // Cyclic core: no essential prime implicant at all.
        let minterms = [0, 1, 2, 5, 6, 7];

        let cover = minimize(3, &minterms);

        assert!(cover.len() <= 3);
        assert_equivalent(3, &minterms, &cover);
    }
}
