//! Ordered string permutation (cartesian product) over N lists

/// Every ordered combination taking exactly one element from each list.
///
/// Blank elements are skipped, and a list with no usable element contributes
/// nothing rather than emptying the whole product.
pub fn permute(lists: &[Vec<String>]) -> Vec<Vec<String>> {
    let usable: Vec<Vec<&str>> = lists
        .iter()
        .map(|list| {
            list.iter()
                .map(|s| s.as_str())
                .filter(|s| !s.trim().is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|list| !list.is_empty())
        .collect();

    permute_refs(&usable)
        .into_iter()
        .map(|combination| combination.into_iter().map(str::to_string).collect())
        .collect()
}

/// [`permute`] with every combination joined by `separator`.
pub fn permute_joined(lists: &[Vec<String>], separator: &str) -> Vec<String> {
    permute(lists)
        .into_iter()
        .map(|combination| combination.join(separator))
        .collect()
}

fn permute_refs<'a>(lists: &[Vec<&'a str>]) -> Vec<Vec<&'a str>> {
    match lists {
        [] => Vec::new(),
        [only] => only.iter().map(|value| vec![*value]).collect(),
        [first, rest @ ..] => {
            let tails = permute_refs(rest);
            first
                .iter()
                .flat_map(|head| {
                    tails.iter().map(move |tail| {
                        let mut combination = Vec::with_capacity(tail.len() + 1);
                        combination.push(*head);
                        combination.extend(tail.iter().copied());
                        combination
                    })
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn list(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_single_list() {
        assert_eq!(
            permute(&[list(&["a", "b"])]),
            vec![vec!["a".to_string()], vec!["b".to_string()]]
        );
    }

    #[test]
    fn test_three_lists_in_order() {
        let joined = permute_joined(&[list(&["int", "prd"]), list(&["t1"]), list(&["x", "y"])], ".");
        assert_eq!(joined, vec!["int.t1.x", "int.t1.y", "prd.t1.x", "prd.t1.y"]);
    }

    #[test]
    fn test_blank_elements_skipped() {
        let joined = permute_joined(&[list(&["int", " ", ""]), list(&["orders"])], ".");
        assert_eq!(joined, vec!["int.orders"]);
    }

    #[test]
    fn test_empty_lists_contribute_nothing() {
        let joined = permute_joined(&[list(&["int"]), list(&[]), list(&["", " "]), list(&["orders"])], ".");
        assert_eq!(joined, vec!["int.orders"]);
        assert!(permute(&[]).is_empty());
        assert!(permute(&[list(&[])]).is_empty());
    }
}
