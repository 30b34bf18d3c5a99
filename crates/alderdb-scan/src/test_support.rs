//! Shared test fixtures: an in-memory engine with observable cursor
//! activity, plus canonical path/plan builders.

use crate::{
    engine::{
        counters::ScanCounters,
        cursor::{BitmapCursor, BitmapScanRequest, CursorStats, ScanSource},
        descr::{IndexDescr, IndexId, KeyType, RelationId, TableDescr},
    },
    error::InternalError,
    host::{
        exec::SubPlanState,
        path::{BitmapHeapPath, BitmapQualPath, PathCost, PathInfo},
        plan::{
            BitmapHeapScanPlan, BitmapIndexScanPlan, CompareOp, Expr, Plan, SubPlan, TargetEntry,
            Tuple, Value,
        },
    },
    planner::{build::build_custom_plan, path::CustomPath, plan::CustomScanPlan},
};
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

///
/// MemEngine
///
/// In-memory scan source. Rows carry commit sequence numbers so snapshot
/// visibility is real; cursor construction and counter threading are
/// logged so lifecycle tests can assert on them.
///

pub(crate) struct MemEngine {
    tables: Vec<MemTable>,
    cursor_opens: Cell<usize>,
    counters_seen_at_open: RefCell<Vec<bool>>,
    counters_seen_at_fetch: RefCell<Vec<bool>>,
}

struct MemTable {
    descr: TableDescr,
    rows: Vec<MemRow>,
    // Lossy tables hand every visible row to the cursor and rely on the
    // recheck to drop non-matching candidates.
    lossy: bool,
}

struct MemRow {
    created_csn: u64,
    tuple: Tuple,
}

impl MemEngine {
    pub(crate) fn employees() -> Self {
        Self::employees_inner(false)
    }

    pub(crate) fn lossy_employees() -> Self {
        Self::employees_inner(true)
    }

    fn employees_inner(lossy: bool) -> Self {
        let descr = TableDescr {
            relation: RelationId(1),
            name: "employees".to_string(),
            columns: vec!["id".to_string(), "dept".to_string(), "age".to_string()],
            indexes: vec![
                IndexDescr::new(
                    IndexId(10),
                    "employees_pkey",
                    vec![("id".to_string(), KeyType::Int)],
                    true,
                ),
                IndexDescr::new(
                    IndexId(11),
                    "employees_dept_idx",
                    vec![("dept".to_string(), KeyType::Text)],
                    false,
                ),
                IndexDescr::new(
                    IndexId(13),
                    "employees_age_idx",
                    vec![("age".to_string(), KeyType::Int)],
                    false,
                ),
            ],
        };
        let rows = vec![
            mem_row(1, 1, "eng", 30),
            mem_row(1, 2, "ops", 35),
            mem_row(1, 3, "eng", 40),
            mem_row(5, 4, "eng", 50),
        ];

        Self {
            tables: vec![MemTable { descr, rows, lossy }],
            cursor_opens: Cell::new(0),
            counters_seen_at_open: RefCell::new(Vec::new()),
            counters_seen_at_fetch: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn composite_pk() -> Self {
        let descr = TableDescr {
            relation: RelationId(2),
            name: "readings".to_string(),
            columns: vec!["site".to_string(), "day".to_string(), "value".to_string()],
            indexes: vec![IndexDescr::new(
                IndexId(20),
                "readings_pkey",
                vec![
                    ("site".to_string(), KeyType::Text),
                    ("day".to_string(), KeyType::Int),
                ],
                true,
            )],
        };

        Self {
            tables: vec![MemTable {
                descr,
                rows: Vec::new(),
                lossy: false,
            }],
            cursor_opens: Cell::new(0),
            counters_seen_at_open: RefCell::new(Vec::new()),
            counters_seen_at_fetch: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn employees_relation(&self) -> RelationId {
        RelationId(1)
    }

    pub(crate) fn composite_relation(&self) -> RelationId {
        RelationId(2)
    }

    pub(crate) fn cursor_opens(&self) -> usize {
        self.cursor_opens.get()
    }

    pub(crate) fn counters_seen_at_open(&self) -> Vec<bool> {
        self.counters_seen_at_open.borrow().clone()
    }

    pub(crate) fn counters_seen_at_fetch(&self) -> Vec<bool> {
        self.counters_seen_at_fetch.borrow().clone()
    }
}

impl ScanSource for MemEngine {
    fn relation_descr(&self, relation: RelationId) -> Option<&TableDescr> {
        self.tables
            .iter()
            .find(|table| table.descr.relation == relation)
            .map(|table| &table.descr)
    }

    fn begin_bitmap_scan<'a>(
        &'a self,
        request: BitmapScanRequest<'_>,
        mut counters: Option<&mut ScanCounters>,
    ) -> Result<Box<dyn BitmapCursor + 'a>, InternalError> {
        let table = self
            .tables
            .iter()
            .find(|table| table.descr.relation == request.relation)
            .ok_or_else(|| {
                InternalError::engine_internal(format!(
                    "bitmap scan over unknown relation: {}",
                    request.relation
                ))
            })?;

        self.cursor_opens.set(self.cursor_opens.get() + 1);
        self.counters_seen_at_open
            .borrow_mut()
            .push(counters.is_some());

        let visible: Vec<usize> = table
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| request.snapshot.sees(row.created_csn))
            .map(|(position, _)| position)
            .collect();

        let bitmap = eval_bitmap(table, &visible, request.producer, &mut counters)?;
        let recheck = recheck_tree(request.producer)?;
        let candidates: Vec<Tuple> = bitmap
            .iter()
            .map(|position| table.rows[*position].tuple.clone())
            .collect();

        Ok(Box::new(MemCursor {
            engine: self,
            columns: table.descr.columns.clone(),
            candidates,
            pos: 0,
            recheck,
            stats: CursorStats::default(),
            arena: request.arena,
        }))
    }
}

// Evaluate the bitmap-producing state tree into a set of row positions,
// recording per-index activity when counters are threaded in.
fn eval_bitmap(
    table: &MemTable,
    visible: &[usize],
    state: &SubPlanState,
    counters: &mut Option<&mut ScanCounters>,
) -> Result<BTreeSet<usize>, InternalError> {
    match state {
        SubPlanState::And(children) => {
            let mut acc: Option<BTreeSet<usize>> = None;
            for child in children {
                let set = eval_bitmap(table, visible, child, counters)?;
                acc = Some(match acc {
                    None => set,
                    Some(prev) => prev.intersection(&set).copied().collect(),
                });
            }
            Ok(acc.unwrap_or_default())
        }
        SubPlanState::Or(children) => {
            let mut acc = BTreeSet::new();
            for child in children {
                acc.extend(eval_bitmap(table, visible, child, counters)?);
            }
            Ok(acc)
        }
        SubPlanState::IndexScan(leaf) => {
            let position = table.descr.index_position(leaf.index_id).ok_or_else(|| {
                InternalError::engine_internal(format!(
                    "bitmap producer references unknown index: {}",
                    leaf.index_id
                ))
            })?;

            let mut set = BTreeSet::new();
            for row_position in visible {
                let tuple = &table.rows[*row_position].tuple;
                let matched = if table.lossy {
                    true
                } else {
                    quals_match(&leaf.index_quals, tuple, &table.descr.columns)?
                };
                if matched {
                    set.insert(*row_position);
                }
            }

            if let Some(counters) = counters.as_mut() {
                if let Some(slot) = counters.get_mut(position) {
                    slot.scans += 1;
                    slot.tuples_fetched += set.len() as u64;
                }
            }

            Ok(set)
        }
        SubPlanState::PassThrough(_) => Err(InternalError::engine_internal(
            "bitmap producer contains an unsupported node kind",
        )),
    }
}

// Recheck mirror of the producer tree; the cursor re-evaluates it against
// every candidate tuple.
enum RecheckNode {
    And(Vec<RecheckNode>),
    Or(Vec<RecheckNode>),
    Leaf(Vec<Expr>),
}

fn recheck_tree(state: &SubPlanState) -> Result<RecheckNode, InternalError> {
    match state {
        SubPlanState::And(children) => Ok(RecheckNode::And(
            children.iter().map(recheck_tree).collect::<Result<_, _>>()?,
        )),
        SubPlanState::Or(children) => Ok(RecheckNode::Or(
            children.iter().map(recheck_tree).collect::<Result<_, _>>()?,
        )),
        SubPlanState::IndexScan(leaf) => Ok(RecheckNode::Leaf(leaf.index_quals.clone())),
        SubPlanState::PassThrough(_) => Err(InternalError::engine_internal(
            "bitmap producer contains an unsupported node kind",
        )),
    }
}

fn recheck_matches(
    node: &RecheckNode,
    tuple: &Tuple,
    columns: &[String],
) -> Result<bool, InternalError> {
    match node {
        RecheckNode::And(children) => {
            for child in children {
                if !recheck_matches(child, tuple, columns)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        RecheckNode::Or(children) => {
            for child in children {
                if recheck_matches(child, tuple, columns)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        RecheckNode::Leaf(quals) => quals_match(quals, tuple, columns),
    }
}

fn quals_match(quals: &[Expr], tuple: &Tuple, columns: &[String]) -> Result<bool, InternalError> {
    for qual in quals {
        if !qual.matches(tuple, columns)? {
            return Ok(false);
        }
    }
    Ok(true)
}

///
/// MemCursor
///

struct MemCursor<'a> {
    engine: &'a MemEngine,
    columns: Vec<String>,
    candidates: Vec<Tuple>,
    pos: usize,
    recheck: RecheckNode,
    stats: CursorStats,
    arena: Rc<crate::engine::arena::ScanArena>,
}

impl BitmapCursor for MemCursor<'_> {
    fn fetch(
        &mut self,
        counters: Option<&mut ScanCounters>,
    ) -> Result<Option<Tuple>, InternalError> {
        self.engine
            .counters_seen_at_fetch
            .borrow_mut()
            .push(counters.is_some());

        loop {
            if self.pos >= self.candidates.len() {
                return Ok(None);
            }
            let tuple = self.candidates[self.pos].clone();
            self.pos += 1;

            self.stats.tuples_rechecked += 1;
            let scratch: String = tuple.values.iter().map(ToString::to_string).collect();
            self.arena.stash(scratch.into_bytes());

            if recheck_matches(&self.recheck, &tuple, &self.columns)? {
                return Ok(Some(tuple));
            }
            self.stats.recheck_dropped += 1;
        }
    }

    fn stats(&self) -> CursorStats {
        self.stats
    }

    fn release(self: Box<Self>) -> Result<(), InternalError> {
        Ok(())
    }
}

// ------------------------------------------------------------------
// Fixture rows and qualifiers
// ------------------------------------------------------------------

fn mem_row(created_csn: u64, id: i64, dept: &str, age: i64) -> MemRow {
    MemRow {
        created_csn,
        tuple: Tuple::new(vec![
            Value::Int(id),
            Value::Text(dept.to_string()),
            Value::Int(age),
        ]),
    }
}

pub(crate) fn dept_eq(value: &str) -> Expr {
    Expr::Compare {
        field: "dept".to_string(),
        op: CompareOp::Eq,
        value: Value::Text(value.to_string()),
    }
}

pub(crate) fn age_ge(value: i64) -> Expr {
    Expr::Compare {
        field: "age".to_string(),
        op: CompareOp::Ge,
        value: Value::Int(value),
    }
}

pub(crate) fn id_gt(value: i64) -> Expr {
    Expr::Compare {
        field: "id".to_string(),
        op: CompareOp::Gt,
        value: Value::Int(value),
    }
}

// ------------------------------------------------------------------
// Canonical paths and plans
// ------------------------------------------------------------------

pub(crate) fn employees_bitmap_path() -> CustomPath {
    CustomPath::from_bitmap_heap(BitmapHeapPath {
        info: PathInfo::serial(PathCost::new(1.0, 20.0), 2.0),
        bitmap_qual: BitmapQualPath::IndexPath {
            index_id: IndexId(11),
            index_quals: vec![dept_eq("eng")],
        },
    })
}

pub(crate) fn employees_bitmap_plan() -> BitmapHeapScanPlan {
    BitmapHeapScanPlan {
        target_list: vec![TargetEntry::column("id"), TargetEntry::column("dept")],
        qual: vec![],
        recheck_quals: vec![dept_eq("eng")],
        bitmap_subplan: SubPlan::IndexScan(BitmapIndexScanPlan {
            index_id: IndexId(11),
            index_quals: vec![dept_eq("eng")],
        }),
    }
}

/// Single-index bitmap plan over `dept = 'eng'`, lowered through the
/// real builder against `engine`.
pub(crate) fn employees_custom_plan_with(engine: &MemEngine) -> CustomScanPlan {
    build_custom_plan(
        engine,
        engine.employees_relation(),
        &employees_bitmap_path(),
        &[Plan::BitmapHeapScan(employees_bitmap_plan())],
    )
    .expect("fixture plan should lower")
}

pub(crate) fn employees_custom_plan() -> CustomScanPlan {
    employees_custom_plan_with(&MemEngine::employees())
}

/// Bitmap over the primary key (all rows) with a residual filter.
pub(crate) fn employees_custom_plan_with_filter(
    engine: &MemEngine,
    qual: Expr,
) -> CustomScanPlan {
    let bh_plan = BitmapHeapScanPlan {
        target_list: vec![TargetEntry::column("id"), TargetEntry::column("dept")],
        qual: vec![qual],
        recheck_quals: vec![],
        bitmap_subplan: SubPlan::IndexScan(BitmapIndexScanPlan {
            index_id: IndexId(10),
            index_quals: vec![id_gt(0)],
        }),
    };

    build_custom_plan(
        engine,
        engine.employees_relation(),
        &employees_bitmap_path(),
        &[Plan::BitmapHeapScan(bh_plan)],
    )
    .expect("fixture plan should lower")
}

/// OR(dept leaf, AND(age leaf, pkey leaf)) combinator fixture.
pub(crate) fn employees_custom_plan_or_and(engine: &MemEngine) -> CustomScanPlan {
    let bh_plan = BitmapHeapScanPlan {
        target_list: vec![TargetEntry::column("id"), TargetEntry::column("dept")],
        qual: vec![],
        recheck_quals: vec![],
        bitmap_subplan: SubPlan::Or(vec![
            SubPlan::IndexScan(BitmapIndexScanPlan {
                index_id: IndexId(11),
                index_quals: vec![dept_eq("eng")],
            }),
            SubPlan::And(vec![
                SubPlan::IndexScan(BitmapIndexScanPlan {
                    index_id: IndexId(13),
                    index_quals: vec![age_ge(30)],
                }),
                SubPlan::IndexScan(BitmapIndexScanPlan {
                    index_id: IndexId(10),
                    index_quals: vec![id_gt(0)],
                }),
            ]),
        ]),
    };

    build_custom_plan(
        engine,
        engine.employees_relation(),
        &employees_bitmap_path(),
        &[Plan::BitmapHeapScan(bh_plan)],
    )
    .expect("fixture plan should lower")
}
