//! Dependency Resolver - mod 활성화 순서 결정
//!
//! 매니페스트 목록에서 인덱스 기반 인접 구조를 만들고, 반복적(스택 기반)
//! 위상 정렬로 전체 순서를 냅니다. 실패는 항상 배치 전체를 중단시키며
//! 부분 순서를 반환하지 않습니다.

use super::manifest::ModManifest;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

// ============================================================================
// DependencyError
// ============================================================================

/// 의존성 해석 실패 (fail-fast, 배치 중단)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DependencyError {
    /// 같은 id의 매니페스트가 배치에 두 번 들어옴
    #[error("duplicate mod id in batch: {id}")]
    Duplicate { id: String },

    /// 입력 집합에 없는 id를 의존성으로 선언
    #[error("mod '{dependent}' requires missing dependency '{missing}'")]
    Missing { dependent: String, missing: String },

    /// 순환 의존. `cycle`은 순환에 참여한 모든 id (표시용으로 닫힌 고리)
    #[error("circular dependency detected: {}", .cycle.join(" -> "))]
    Cycle { cycle: Vec<String> },
}

// ============================================================================
// DependencyGraph
// ============================================================================

/// 의존성 그래프 - 노드는 매니페스트, 엣지는 "depends on"
///
/// 배치 로드마다 한 번 만들어 해석 후 버립니다.
pub struct DependencyGraph {
    ids: Vec<String>,

    /// deps[i] = i번째 mod가 의존하는 노드 인덱스 (선언 순서)
    deps: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// 매니페스트 목록에서 그래프 생성
    ///
    /// 중복 id와 누락된 의존성은 여기서 즉시 거부됩니다.
    pub fn build(manifests: &[ModManifest]) -> Result<Self, DependencyError> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(manifests.len());
        for (i, manifest) in manifests.iter().enumerate() {
            if index.insert(manifest.id.as_str(), i).is_some() {
                return Err(DependencyError::Duplicate {
                    id: manifest.id.clone(),
                });
            }
        }

        let mut deps = Vec::with_capacity(manifests.len());
        for manifest in manifests {
            let mut row = Vec::with_capacity(manifest.dependencies.len());
            for dep in manifest.dependency_ids() {
                match index.get(dep) {
                    Some(&target) => row.push(target),
                    None => {
                        return Err(DependencyError::Missing {
                            dependent: manifest.id.clone(),
                            missing: dep.to_string(),
                        });
                    }
                }
            }
            deps.push(row);
        }

        Ok(Self {
            ids: manifests.iter().map(|m| m.id.clone()).collect(),
            deps,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id(&self, index: usize) -> &str {
        &self.ids[index]
    }

    /// 위상 정렬 - 모든 의존성이 의존자보다 앞에 오는 전체 순서
    ///
    /// 반복적 DFS (명시적 스택, 재귀 없음): mod 수가 많아도 호출 스택
    /// 깊이에 제한받지 않습니다. `Visiting` 상태는 순환 보고에만 쓰이며,
    /// 상호 독립인 mod는 입력 순서를 유지합니다.
    pub fn resolve(&self) -> Result<Vec<usize>, DependencyError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Visiting,
            Done,
        }

        let n = self.ids.len();
        let mut marks = vec![Mark::Unvisited; n];
        let mut order = Vec::with_capacity(n);

        // (노드, 다음에 볼 의존성 엣지 인덱스)
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for root in 0..n {
            if marks[root] != Mark::Unvisited {
                continue;
            }

            marks[root] = Mark::Visiting;
            stack.push((root, 0));

            while let Some(frame) = stack.last_mut() {
                let (node, next_edge) = *frame;

                if let Some(&dep) = self.deps[node].get(next_edge) {
                    frame.1 += 1;
                    match marks[dep] {
                        Mark::Unvisited => {
                            marks[dep] = Mark::Visiting;
                            stack.push((dep, 0));
                        }
                        Mark::Visiting => {
                            return Err(self.cycle_from_stack(&stack, dep));
                        }
                        Mark::Done => {}
                    }
                } else {
                    // 의존성을 전부 방문한 노드는 순서에 확정
                    marks[node] = Mark::Done;
                    order.push(node);
                    stack.pop();
                }
            }
        }

        Ok(order)
    }

    /// 현재 방문 스택에서 순환 참여 id 복원
    fn cycle_from_stack(&self, stack: &[(usize, usize)], entry: usize) -> DependencyError {
        let start = stack
            .iter()
            .position(|&(node, _)| node == entry)
            .unwrap_or(0);

        let mut cycle: Vec<String> = stack[start..]
            .iter()
            .map(|&(node, _)| self.ids[node].clone())
            .collect();
        cycle.push(self.ids[entry].clone());

        DependencyError::Cycle { cycle }
    }
}

/// 매니페스트 목록을 활성화 순서(id 목록)로 해석
///
/// 언로드 순서는 이 결과의 역순입니다.
pub fn resolve_load_order(manifests: &[ModManifest]) -> Result<Vec<String>, DependencyError> {
    let graph = DependencyGraph::build(manifests)?;
    let order = graph.resolve()?;

    debug!(count = order.len(), "Resolved mod load order");

    Ok(order
        .into_iter()
        .map(|index| graph.ids[index].clone())
        .collect())
}

// ============================================================================
// 테스트
// ============================================================================
