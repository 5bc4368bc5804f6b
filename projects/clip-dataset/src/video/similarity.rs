// Ratcliff/Obershelp similarity, as defined by difflib's SequenceMatcher.ratio()
//
// ratio = 2 * M / T, where T is the combined length and M the total size of
// the matching blocks found by recursively taking the longest common block
// and repeating on both sides of it.

use std::collections::HashMap;

/// Sequences at least this long get the "popular element" heuristic.
const AUTOJUNK_MIN_LEN: usize = 200;

/// Similarity ratio in `[0, 1]`. Two empty strings are identical (1.0).
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matches = Matcher::new(&a, &b).matching_characters();
    2.0 * matches as f64 / total as f64
}

struct Matcher<'a> {
    a: &'a [char],
    b: &'a [char],
    /// Positions of each element of `b`, popular elements excluded
    b2j: HashMap<char, Vec<usize>>,
}

impl<'a> Matcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, c) in b.iter().enumerate() {
            b2j.entry(*c).or_default().push(j);
        }

        let n = b.len();
        if n >= AUTOJUNK_MIN_LEN {
            let limit = n / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= limit);
        }

        Self { a, b, b2j }
    }

    /// Longest matching block in `a[alo..ahi]` x `b[blo..bhi]`, earliest on ties.
    fn find_longest_match(
        &self,
        alo: usize,
        ahi: usize,
        blo: usize,
        bhi: usize,
    ) -> (usize, usize, usize) {
        let (mut besti, mut bestj, mut bestsize) = (alo, blo, 0);
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in alo..ahi {
            let mut new_j2len = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j.checked_sub(1).and_then(|p| j2len.get(&p)).copied().unwrap_or(0) + 1;
                    new_j2len.insert(j, k);
                    if k > bestsize {
                        besti = i + 1 - k;
                        bestj = j + 1 - k;
                        bestsize = k;
                    }
                }
            }
            j2len = new_j2len;
        }

        // Popular elements were left out of b2j; grow the block across them
        while besti > alo && bestj > blo && self.a[besti - 1] == self.b[bestj - 1] {
            besti -= 1;
            bestj -= 1;
            bestsize += 1;
        }
        while besti + bestsize < ahi
            && bestj + bestsize < bhi
            && self.a[besti + bestsize] == self.b[bestj + bestsize]
        {
            bestsize += 1;
        }

        (besti, bestj, bestsize)
    }

    fn matching_characters(&self) -> usize {
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        let mut matched = 0;

        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let (i, j, k) = self.find_longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            matched += k;
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }

        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identical_and_disjoint() {
        assert!(close(similarity_ratio("clip", "clip"), 1.0));
        assert!(close(similarity_ratio("", ""), 1.0));
        assert!(close(similarity_ratio("abc", "xyz"), 0.0));
        assert!(close(similarity_ratio("abc", ""), 0.0));
    }

    #[test]
    fn test_known_ratios() {
        // One substitution in four characters: M = 3, T = 8
        assert!(close(similarity_ratio("abcd", "abce"), 0.75));
        assert!(close(similarity_ratio("abcd", "bcde"), 0.75));
        // Blocks "ab" and "cd"
        assert!(close(similarity_ratio("qabxcd", "abycdf"), 2.0 * 4.0 / 12.0));
    }

    #[test]
    fn test_is_symmetric_for_simple_inputs() {
        let a = "12-2_cam02_assault01_place09_day_spring";
        let b = "12-2_cam02_assault01_place09_night_summer";
        assert!(close(similarity_ratio(a, b), similarity_ratio(b, a)));
        // Shared prefix (29) + "_s" + "r": 2 * 32 / 80
        assert!(close(similarity_ratio(a, b), 0.8));
    }

    #[test]
    fn test_renamed_video_scores_high() {
        let hint = "12-2_cam02_assault01_place09";
        let file = "12-2_cam02_assault01_place09_";
        assert!(similarity_ratio(hint, file) > 0.8);
        assert!(similarity_ratio(hint, "34-1_cam01_swoon02_place01") < 0.8);
    }

    #[test]
    fn test_long_inputs_use_popular_element_heuristic() {
        let a = "a".repeat(250);
        let b = "a".repeat(250);
        // Every element is popular, blocks still extend across them
        assert!(close(similarity_ratio(&a, &b), 1.0));
    }
}
