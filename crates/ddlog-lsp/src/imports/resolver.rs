//! Import search and transitive walk.
//!
//! Direct edges are resolved per document version and memoized in the
//! session's [`ImportCache`](super::ImportCache). The transitive walk collects
//! those edges with a work list, then finds cycles as strongly connected
//! components.

use super::{ImportError, ResolvedImport, extract_imports};
use crate::session::{Session, normalize_path};
use ddlog_core::ModulePath;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

type Outcome = Result<PathBuf, ImportError>;

/// Resolves the direct imports of `path` in source order.
///
/// Unknown documents and documents without a tree yield no imports. Each
/// import gets its own outcome; one failure never hides its siblings.
pub async fn resolve_direct(session: &Session, path: &Path) -> Vec<ResolvedImport> {
    let Some(snapshot) = session.parsed_snapshot(path).await else {
        return Vec::new();
    };
    let Some(tree) = snapshot.tree.as_ref() else {
        return Vec::new();
    };
    let version = snapshot.tree_version.unwrap_or(snapshot.version);

    let mut resolved = Vec::new();
    for import in extract_imports(tree) {
        let cache = session.imports();
        let outcome = match cache.get(path, version, &import.module) {
            // A target swept between its load and this entry's insertion is
            // searched for (and loaded) again.
            Some(Ok(target)) if !session.contains(&target) => {
                tracing::debug!(target = %target.display(), "cached import target was evicted");
                resolve_and_record(session, path, version, &import.module).await
            }
            Some(outcome) => outcome,
            None => resolve_and_record(session, path, version, &import.module).await,
        };
        resolved.push(ResolvedImport { import, outcome });
    }
    resolved
}

async fn resolve_and_record(
    session: &Session,
    importer: &Path,
    version: u64,
    module: &ModulePath,
) -> Outcome {
    let cache = session.imports();
    let outcome = search(session, importer, module).await;
    cache.record_resolution();
    cache.insert(importer, version, module, outcome.clone());
    tracing::debug!(
        importer = %importer.display(),
        %module,
        ?outcome,
        "import resolved"
    );
    outcome
}

/// Resolves every document reachable from `root` and returns the direct edges
/// of each. Every edge whose two ends lie in one strongly connected component
/// is rewritten to [`ImportError::Cyclic`]; self-imports included.
pub async fn resolve_graph(session: &Session, root: &Path) -> HashMap<PathBuf, Vec<ResolvedImport>> {
    let mut edges: HashMap<PathBuf, Vec<ResolvedImport>> = HashMap::new();
    let mut nodes: Vec<PathBuf> = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(path) = pending.pop() {
        if edges.contains_key(&path) {
            continue;
        }
        let imports = resolve_direct(session, &path).await;
        pending.extend(
            imports
                .iter()
                .rev()
                .filter_map(|import| import.target().map(Path::to_path_buf)),
        );
        nodes.push(path.clone());
        edges.insert(path, imports);
    }

    let position: HashMap<&Path, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, path)| (path.as_path(), i))
        .collect();
    let adjacency: Vec<Vec<Option<usize>>> = nodes
        .iter()
        .map(|path| {
            edges[path]
                .iter()
                .map(|import| import.target().and_then(|t| position.get(t).copied()))
                .collect()
        })
        .collect();

    let component = strongly_connected(&adjacency);
    let mut cycles = Vec::new();
    for (from, targets) in adjacency.iter().enumerate() {
        for (slot, to) in targets.iter().enumerate() {
            let Some(to) = *to else {
                continue;
            };
            if component[from] != component[to] {
                continue;
            }
            let mut cycle = vec![nodes[from].clone()];
            cycle.extend(
                shortest_path(&adjacency, &component, to, from)
                    .into_iter()
                    .map(|node| nodes[node].clone()),
            );
            cycles.push((from, slot, cycle));
        }
    }
    if !cycles.is_empty() {
        tracing::debug!(edges = cycles.len(), "import cycle detected");
    }
    for (from, slot, cycle) in cycles {
        if let Some(edge) = edges
            .get_mut(&nodes[from])
            .and_then(|imports| imports.get_mut(slot))
        {
            edge.outcome = Err(ImportError::Cyclic { cycle });
        }
    }
    edges
}

/// Component id of every node (Tarjan, explicit stack). `None` entries are
/// edges without a target.
fn strongly_connected(adjacency: &[Vec<Option<usize>>]) -> Vec<usize> {
    let count = adjacency.len();
    let mut index: Vec<Option<usize>> = vec![None; count];
    let mut lowlink = vec![0; count];
    let mut on_stack = vec![false; count];
    let mut stack = Vec::new();
    let mut component = vec![usize::MAX; count];
    let mut next_index = 0;
    let mut next_component = 0;

    for root in 0..count {
        if index[root].is_some() {
            continue;
        }
        let mut work = vec![(root, 0)];
        while let Some(frame) = work.last_mut() {
            let (node, child) = *frame;
            if child == 0 && index[node].is_none() {
                index[node] = Some(next_index);
                lowlink[node] = next_index;
                next_index += 1;
                stack.push(node);
                on_stack[node] = true;
            }

            if let Some(edge) = adjacency[node].get(child) {
                frame.1 += 1;
                let Some(next) = *edge else {
                    continue;
                };
                match index[next] {
                    None => work.push((next, 0)),
                    Some(seen) if on_stack[next] => lowlink[node] = lowlink[node].min(seen),
                    Some(_) => {}
                }
                continue;
            }

            work.pop();
            if let Some(&(parent, _)) = work.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[node]);
            }
            if index[node] == Some(lowlink[node]) {
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    component[member] = next_component;
                    if member == node {
                        break;
                    }
                }
                next_component += 1;
            }
        }
    }
    component
}

/// Breadth-first path `from -> .. -> to` inside one component, both ends
/// included.
fn shortest_path(
    adjacency: &[Vec<Option<usize>>],
    component: &[usize],
    from: usize,
    to: usize,
) -> Vec<usize> {
    let mut parent: HashMap<usize, usize> = HashMap::new();
    let mut queue = VecDeque::from([from]);
    let mut seen = HashSet::from([from]);

    while let Some(node) = queue.pop_front() {
        if node == to {
            break;
        }
        for next in adjacency[node].iter().flatten().copied() {
            if component[next] == component[from] && seen.insert(next) {
                parent.insert(next, node);
                queue.push_back(next);
            }
        }
    }

    let mut path = vec![to];
    let mut node = to;
    while node != from {
        let Some(&previous) = parent.get(&node) else {
            break;
        };
        path.push(previous);
        node = previous;
    }
    path.reverse();
    path
}

/// Runs the search order for one import of `importer`.
async fn search(session: &Session, importer: &Path, module: &ModulePath) -> Outcome {
    let config = session.config();
    let load_from_disk = config.imports.load_from_disk;
    let relative = module.to_relative_path();

    let base = session
        .folder_for(importer)
        .map(|folder| folder.root)
        .or_else(|| importer.parent().map(Path::to_path_buf));
    if let Some(base) = base {
        let exact = normalize_path(&base.join(&relative));
        if session.contains(&exact) {
            return Ok(exact);
        }
        if load_from_disk && is_file(&exact).await {
            return load_candidate(session, exact).await;
        }
    }

    let mut candidates = BTreeSet::new();
    let known = session.known_paths();
    for dir in module_root_dirs(session, &config.imports.module_roots) {
        candidates.extend(
            known
                .iter()
                .filter(|path| path.starts_with(&dir) && path.ends_with(&relative))
                .cloned(),
        );
        if load_from_disk {
            let probe = normalize_path(&dir.join(&relative));
            if !candidates.contains(&probe) && is_file(&probe).await {
                candidates.insert(probe);
            }
        }
    }

    let mut candidates: Vec<PathBuf> = candidates.into_iter().collect();
    match candidates.len() {
        0 => Err(ImportError::Unresolved),
        1 => {
            let target = candidates.remove(0);
            if session.contains(&target) {
                Ok(target)
            } else {
                load_candidate(session, target).await
            }
        }
        _ => Err(ImportError::Ambiguous { candidates }),
    }
}

/// Module-root directories: relative entries joined to every workspace
/// folder, absolute entries as given.
fn module_root_dirs(session: &Session, roots: &[PathBuf]) -> BTreeSet<PathBuf> {
    let folders = session.folders();
    let mut dirs = BTreeSet::new();
    for root in roots {
        if root.is_absolute() {
            dirs.insert(normalize_path(root));
        } else {
            dirs.extend(
                folders
                    .iter()
                    .map(|folder| normalize_path(&folder.root.join(root))),
            );
        }
    }
    dirs
}

async fn load_candidate(session: &Session, target: PathBuf) -> Outcome {
    match session.load_from_disk(&target).await {
        Ok(_) => Ok(target),
        Err(e) => {
            tracing::warn!("cannot load import target {}: {e}", target.display());
            Err(ImportError::Unresolved)
        }
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DdlogConfig, ImportsConfig};
    use tempfile::TempDir;

    fn session_without_disk() -> Session {
        Session::with_config(DdlogConfig {
            imports: ImportsConfig {
                load_from_disk: false,
                ..ImportsConfig::default()
            },
            ..DdlogConfig::default()
        })
    }

    fn outcomes(imports: &[ResolvedImport]) -> Vec<Outcome> {
        imports.iter().map(|i| i.outcome.clone()).collect()
    }

    #[tokio::test]
    async fn test_resolves_sibling_in_same_folder() {
        let session = session_without_disk();
        session.add_folder(PathBuf::from("/ws"), "ws".into());
        session.open(Path::new("/ws/a.dl"), "import b\nimport c", None).unwrap();
        session.open(Path::new("/ws/b.dl"), "relation B()", None).unwrap();

        let imports = resolve_direct(&session, Path::new("/ws/a.dl")).await;
        assert_eq!(
            outcomes(&imports),
            vec![Ok(PathBuf::from("/ws/b.dl")), Err(ImportError::Unresolved)]
        );
    }

    #[tokio::test]
    async fn test_nested_module_path_uses_folder_root() {
        let session = session_without_disk();
        session.add_folder(PathBuf::from("/ws"), "ws".into());
        session.open(Path::new("/ws/src/main.dl"), "import lib::graph", None).unwrap();
        session.open(Path::new("/ws/lib/graph.dl"), "relation Edge(a: u32, b: u32)", None).unwrap();

        let imports = resolve_direct(&session, Path::new("/ws/src/main.dl")).await;
        assert_eq!(outcomes(&imports), vec![Ok(PathBuf::from("/ws/lib/graph.dl"))]);
    }

    #[tokio::test]
    async fn test_untracked_document_resolves_against_parent_dir() {
        let session = session_without_disk();
        session.open(Path::new("/tmp/x/a.dl"), "import b", None).unwrap();
        session.open(Path::new("/tmp/x/b.dl"), "", None).unwrap();

        let imports = resolve_direct(&session, Path::new("/tmp/x/a.dl")).await;
        assert_eq!(outcomes(&imports), vec![Ok(PathBuf::from("/tmp/x/b.dl"))]);
    }

    #[tokio::test]
    async fn test_module_roots_across_folders_are_ambiguous() {
        let session = Session::with_config(DdlogConfig {
            imports: ImportsConfig {
                module_roots: vec![PathBuf::from("lib")],
                load_from_disk: false,
                ..ImportsConfig::default()
            },
            ..DdlogConfig::default()
        });
        session.add_folder(PathBuf::from("/one"), "one".into());
        session.add_folder(PathBuf::from("/two"), "two".into());
        session.open(Path::new("/one/a.dl"), "import util", None).unwrap();
        session.open(Path::new("/one/lib/util.dl"), "", None).unwrap();
        session.open(Path::new("/two/lib/util.dl"), "", None).unwrap();

        let imports = resolve_direct(&session, Path::new("/one/a.dl")).await;
        assert_eq!(
            outcomes(&imports),
            vec![Err(ImportError::Ambiguous {
                candidates: vec![
                    PathBuf::from("/one/lib/util.dl"),
                    PathBuf::from("/two/lib/util.dl"),
                ],
            })]
        );
    }

    #[tokio::test]
    async fn test_module_root_suffix_match() {
        let session = Session::with_config(DdlogConfig {
            imports: ImportsConfig {
                module_roots: vec![PathBuf::from("/usr/share/ddlog")],
                load_from_disk: false,
                ..ImportsConfig::default()
            },
            ..DdlogConfig::default()
        });
        session.add_folder(PathBuf::from("/ws"), "ws".into());
        session.open(Path::new("/ws/a.dl"), "import std::vec", None).unwrap();
        session
            .open(Path::new("/usr/share/ddlog/lib/std/vec.dl"), "", None)
            .unwrap();

        let imports = resolve_direct(&session, Path::new("/ws/a.dl")).await;
        assert_eq!(
            outcomes(&imports),
            vec![Ok(PathBuf::from("/usr/share/ddlog/lib/std/vec.dl"))]
        );
    }

    #[tokio::test]
    async fn test_exact_match_loads_from_disk() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        std::fs::write(root.join("b.dl"), "relation B()").unwrap();

        let session = Session::new();
        session.add_folder(root.clone(), "ws".into());
        session.open(&root.join("a.dl"), "import b", None).unwrap();

        let imports = resolve_direct(&session, &root.join("a.dl")).await;
        assert_eq!(outcomes(&imports), vec![Ok(root.join("b.dl"))]);
        assert!(session.contains(&root.join("b.dl")));
    }

    #[tokio::test]
    async fn test_direct_resolution_is_memoized() {
        let session = session_without_disk();
        session.add_folder(PathBuf::from("/ws"), "ws".into());
        session.open(Path::new("/ws/a.dl"), "import b\nimport c", None).unwrap();
        session.open(Path::new("/ws/b.dl"), "", None).unwrap();

        let first = resolve_direct(&session, Path::new("/ws/a.dl")).await;
        let count = session.imports().resolution_count();
        assert_eq!(count, 2);

        let second = resolve_direct(&session, Path::new("/ws/a.dl")).await;
        assert_eq!(first, second);
        assert_eq!(session.imports().resolution_count(), count);
    }

    #[tokio::test]
    async fn test_graph_marks_every_cycle_edge() {
        let session = session_without_disk();
        session.add_folder(PathBuf::from("/ws"), "ws".into());
        session.open(Path::new("/ws/a.dl"), "import b\nimport c", None).unwrap();
        session.open(Path::new("/ws/b.dl"), "import a", None).unwrap();
        session.open(Path::new("/ws/c.dl"), "", None).unwrap();

        let graph = resolve_graph(&session, Path::new("/ws/a.dl")).await;
        let a = PathBuf::from("/ws/a.dl");
        let b = PathBuf::from("/ws/b.dl");

        let from_a = &graph[Path::new("/ws/a.dl")];
        assert_eq!(
            from_a[0].outcome,
            Err(ImportError::Cyclic {
                cycle: vec![a.clone(), b.clone(), a.clone()],
            })
        );
        assert_eq!(from_a[1].outcome, Ok(PathBuf::from("/ws/c.dl")));
        let from_b = &graph[Path::new("/ws/b.dl")];
        assert_eq!(
            from_b[0].outcome,
            Err(ImportError::Cyclic {
                cycle: vec![b.clone(), a.clone(), b],
            })
        );
    }

    fn cyclic_edges(graph: &HashMap<PathBuf, Vec<ResolvedImport>>) -> Vec<(String, String)> {
        let mut cyclic: Vec<_> = graph
            .iter()
            .flat_map(|(from, imports)| {
                imports.iter().filter_map(move |import| match &import.outcome {
                    Err(ImportError::Cyclic { cycle }) => {
                        assert_eq!(cycle.first(), Some(from));
                        assert_eq!(cycle.last(), Some(from));
                        Some((from.display().to_string(), import.import.module.to_string()))
                    }
                    _ => None,
                })
            })
            .collect();
        cyclic.sort();
        cyclic
    }

    #[tokio::test]
    async fn test_cycle_through_finished_document_is_marked() {
        for importer in ["import b\nimport c", "import c\nimport b"] {
            let session = session_without_disk();
            session.add_folder(PathBuf::from("/ws"), "ws".into());
            session.open(Path::new("/ws/a.dl"), importer, None).unwrap();
            session.open(Path::new("/ws/b.dl"), "import c", None).unwrap();
            session.open(Path::new("/ws/c.dl"), "import a", None).unwrap();

            let graph = resolve_graph(&session, Path::new("/ws/a.dl")).await;
            let edge = |from: &str, to: &str| (format!("/ws/{from}.dl"), to.to_string());
            assert_eq!(
                cyclic_edges(&graph),
                vec![edge("a", "b"), edge("a", "c"), edge("b", "c"), edge("c", "a")],
                "imports of a.dl: {importer:?}"
            );

            let from_a = &graph[Path::new("/ws/a.dl")];
            let to_c = from_a.iter().find(|i| i.import.module.to_string() == "c").unwrap();
            assert_eq!(
                to_c.outcome,
                Err(ImportError::Cyclic {
                    cycle: vec![
                        PathBuf::from("/ws/a.dl"),
                        PathBuf::from("/ws/c.dl"),
                        PathBuf::from("/ws/a.dl"),
                    ],
                })
            );
        }
    }

    #[tokio::test]
    async fn test_edges_leaving_a_cycle_stay_resolved() {
        let session = session_without_disk();
        session.add_folder(PathBuf::from("/ws"), "ws".into());
        session.open(Path::new("/ws/a.dl"), "import b\nimport d", None).unwrap();
        session.open(Path::new("/ws/b.dl"), "import a\nimport d", None).unwrap();
        session.open(Path::new("/ws/d.dl"), "import d", None).unwrap();

        let graph = resolve_graph(&session, Path::new("/ws/a.dl")).await;
        let edge = |from: &str, to: &str| (format!("/ws/{from}.dl"), to.to_string());
        assert_eq!(
            cyclic_edges(&graph),
            vec![edge("a", "b"), edge("b", "a"), edge("d", "d")]
        );
        assert_eq!(graph[Path::new("/ws/a.dl")][1].outcome, Ok(PathBuf::from("/ws/d.dl")));
        assert_eq!(graph[Path::new("/ws/b.dl")][1].outcome, Ok(PathBuf::from("/ws/d.dl")));
    }

    #[tokio::test]
    async fn test_evicted_cached_target_is_loaded_again() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        std::fs::write(root.join("b.dl"), "import c").unwrap();
        std::fs::write(root.join("c.dl"), "relation C()").unwrap();

        let session = Session::new();
        session.add_folder(root.clone(), "ws".into());
        let a = root.join("a.dl");
        let b = root.join("b.dl");
        session.open(&a, "import b", None).unwrap();
        resolve_direct(&session, &a).await;

        // Sweep b away while a's entry still points at it, as a concurrent
        // close can between the disk load and the cache insert.
        let module = ModulePath::parse("b").unwrap();
        session.imports().drop_importer(&a);
        session.sweep();
        assert!(!session.contains(&b));
        session.imports().insert(&a, 0, &module, Ok(b.clone()));
        let count = session.imports().resolution_count();

        let imports = resolve_direct(&session, &a).await;
        assert_eq!(outcomes(&imports), vec![Ok(b.clone())]);
        assert!(session.contains(&b));
        assert_eq!(session.imports().resolution_count(), count + 1);

        let graph = resolve_graph(&session, &a).await;
        assert_eq!(graph[&b][0].outcome, Ok(root.join("c.dl")));
    }

    #[tokio::test]
    async fn test_self_import_is_cyclic() {
        let session = session_without_disk();
        session.open(Path::new("/ws/a.dl"), "import a", None).unwrap();

        let graph = resolve_graph(&session, Path::new("/ws/a.dl")).await;
        assert!(matches!(
            graph[Path::new("/ws/a.dl")][0].outcome,
            Err(ImportError::Cyclic { .. })
        ));
    }

    #[tokio::test]
    async fn test_graph_of_unknown_document_is_empty() {
        let session = Session::new();
        let graph = resolve_graph(&session, Path::new("/ws/missing.dl")).await;
        assert_eq!(graph.len(), 1);
        assert!(graph[Path::new("/ws/missing.dl")].is_empty());
    }
}
