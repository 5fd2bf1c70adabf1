//! Tests for union_find module

use flowclus::union_find::UnionFind;

#[test]
fn test_basic_operations() {
    let mut uf: UnionFind<usize> = UnionFind::new();

    uf.make_set(1);
    uf.make_set(2);
    uf.make_set(3);

    assert!(!uf.connected(&1, &2));

    uf.union(&1, &2);
    assert!(uf.connected(&1, &2));
    assert!(!uf.connected(&1, &3));
}

#[test]
fn test_path_compression() {
    let mut uf: UnionFind<usize> = UnionFind::new();

    // Chain: 4 -> 3 -> 2 -> 1
    for id in 1..=4 {
        uf.make_set(id);
    }
    uf.union(&4, &3);
    uf.union(&3, &2);
    uf.union(&2, &1);

    let root = uf.find(&4);
    assert_eq!(root, 1);
    assert_eq!(uf.find(&2), root);
    assert_eq!(uf.find(&3), root);
}

#[test]
fn test_union_registers_unknown_ids() {
    let mut uf: UnionFind<usize> = UnionFind::with_capacity(2);
    uf.union(&10, &20);
    assert_eq!(uf.len(), 2);
    assert!(uf.connected(&10, &20));
}

#[test]
fn test_groups() {
    let mut uf: UnionFind<String> = UnionFind::new();

    for id in ["a", "b", "c", "d"] {
        uf.make_set(id.to_string());
    }

    uf.union(&"a".to_string(), &"b".to_string());
    uf.union(&"c".to_string(), &"d".to_string());

    let groups = uf.groups();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups["a"], vec!["a".to_string(), "b".to_string()]);
    assert_eq!(groups["c"], vec!["c".to_string(), "d".to_string()]);
}

#[test]
fn test_groups_deterministic() {
    let results: Vec<_> = (0..5)
        .map(|_| {
            let mut uf: UnionFind<usize> = UnionFind::new();
            for id in [9, 2, 7, 4] {
                uf.make_set(id);
            }
            uf.union(&9, &2);
            uf.union(&7, &4);
            uf.groups()
        })
        .collect();

    for i in 1..results.len() {
        assert_eq!(results[0], results[i], "Different groups on run {i}");
    }
    assert_eq!(results[0][&2], vec![2, 9]);
    assert_eq!(results[0][&4], vec![4, 7]);
}
