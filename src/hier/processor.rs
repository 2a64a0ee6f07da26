//! Hierarchical local processor
//!
//! Runs a local operation over a cell hierarchy without flattening it:
//! - Cell variants are formed first if the operation asks for them
//! - Contexts (the intruders reaching into a cell from outside) are
//!   computed top-down and deduplicated per cell
//! - Every (cell, context) pair is computed in parallel
//! - Results common to all contexts of a cell stay in the cell; the rest
//!   is propagated into the instantiating parent contexts, bottom-up

use super::variants::VariantsCollector;
use crate::config::ProcessorConfig;
use crate::geometry::{BBox, BoxScanner, Coord, ICplxTrans};
use crate::layout::{CellIndex, LayerIndex, Layout};
use crate::ops::{
    pc_norm, FromSubject, HierShape, LocalOperation, LocalProcessorBase, LocalShape, OnEmptyIntruderHint,
    ShapeInteractions,
};
use anyhow::{ensure, Context, Result};
use rayon::prelude::*;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// Settings the operations see while a run is in progress
#[derive(Debug, Clone, Default)]
pub struct ProcessorSettings {
    pub area_ratio: f64,
    pub max_vertex_count: usize,
    pub base_verbosity: i32,
    cell_mags: HashMap<CellIndex, f64>,
}

impl LocalProcessorBase for ProcessorSettings {
    fn area_ratio(&self) -> f64 {
        self.area_ratio
    }

    fn max_vertex_count(&self) -> usize {
        self.max_vertex_count
    }

    fn base_verbosity(&self) -> i32 {
        self.base_verbosity
    }

    fn dist_for_cell(&self, cell: CellIndex, dist: Coord) -> Coord {
        match self.cell_mags.get(&cell) {
            Some(&mag) if mag != 1.0 => (dist as f64 / mag).round() as Coord,
            _ => dist,
        }
    }
}

impl ProcessorSettings {
    fn context_log_level(&self) -> log::Level {
        if self.base_verbosity > 0 {
            log::Level::Info
        } else {
            log::Level::Debug
        }
    }
}

/// Intruders (layer role, shape) reaching into a cell, sorted
type ContextKey<TI> = Vec<(usize, TI)>;

#[derive(Debug, Clone, Copy)]
struct ParentLink {
    parent: CellIndex,
    context: usize,
    trans: ICplxTrans,
}

struct CellContext<TI> {
    intruders: ContextKey<TI>,
    parents: Vec<ParentLink>,
}

struct CellContexts<TI> {
    contexts: Vec<CellContext<TI>>,
    index: HashMap<ContextKey<TI>, usize>,
}

impl<TI: LocalShape> CellContexts<TI> {
    fn new() -> Self {
        Self {
            contexts: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// The single empty context of a top cell
    fn root() -> Self {
        let mut cc = Self::new();
        cc.insert(Vec::new(), None);
        cc
    }

    fn insert(&mut self, key: ContextKey<TI>, link: Option<ParentLink>) -> usize {
        let k = match self.index.get(&key) {
            Some(&k) => k,
            None => {
                let k = self.contexts.len();
                self.index.insert(key.clone(), k);
                self.contexts.push(CellContext {
                    intruders: key,
                    parents: Vec::new(),
                });
                k
            }
        };
        if let Some(link) = link {
            self.contexts[k].parents.push(link);
        }
        k
    }
}

impl<TI> CellContexts<TI> {
    fn len(&self) -> usize {
        self.contexts.len()
    }
}

/// Per-cell input shapes and hierarchical boxes
struct LocalData<TS, TI> {
    subjects: Vec<Vec<TS>>,
    intruders: Vec<Vec<(usize, TI)>>,
    same_layer: Vec<bool>,
    subject_boxes: Vec<BBox>,
    intruder_boxes: Vec<BBox>,
}

impl<TS, TI> LocalData<TS, TI>
where
    TS: HierShape + 'static,
    TI: HierShape + 'static,
{
    fn collect(layout: &Layout, subject_layer: LayerIndex, intruder_layers: &[LayerIndex]) -> Self {
        let n = layout.cells();
        let mut subjects = Vec::with_capacity(n);
        let mut intruders = Vec::with_capacity(n);
        for ci in 0..n {
            let cell = layout.cell(ci);

            let mut s = Vec::new();
            if let Some(shapes) = cell.shapes(subject_layer) {
                TS::fetch(shapes, &mut s);
            }
            subjects.push(s);

            let mut own = Vec::new();
            for (role, layer) in intruder_layers.iter().enumerate() {
                let mut v: Vec<TI> = Vec::new();
                if let Some(shapes) = cell.shapes(*layer) {
                    TI::fetch(shapes, &mut v);
                }
                own.extend(v.into_iter().map(|s| (role, s)));
            }
            intruders.push(own);
        }

        // intruders from the subject layer share the subject ids
        let same_type = TypeId::of::<TS>() == TypeId::of::<TI>();
        let same_layer = intruder_layers
            .iter()
            .map(|l| same_type && *l == subject_layer)
            .collect();

        Self {
            subjects,
            intruders,
            same_layer,
            subject_boxes: layout.cell_bboxes(&[subject_layer]),
            intruder_boxes: layout.cell_bboxes(intruder_layers),
        }
    }
}

/// Intruders of a cell's subtree, transformed by `trans`, touching `region`
fn collect_flat_intruders<TS, TI: HierShape>(
    layout: &Layout,
    data: &LocalData<TS, TI>,
    cell: CellIndex,
    trans: &ICplxTrans,
    region: &BBox,
    out: &mut Vec<(usize, TI)>,
) {
    if !trans.apply_box(&data.intruder_boxes[cell]).touches(region) {
        return;
    }
    let repo = layout.shape_repository();
    for (role, s) in &data.intruders[cell] {
        if trans.apply_box(&s.bbox()).touches(region) {
            out.push((*role, s.transformed(trans, repo)));
        }
    }
    for inst in layout.cell(cell).insts() {
        for t in inst.transforms() {
            collect_flat_intruders(layout, data, inst.cell_index, &trans.compose(&t), region, out);
        }
    }
}

/// Walks the hierarchy and runs local operations on it
pub struct LocalProcessor<'a> {
    layout: &'a mut Layout,
    top: CellIndex,
    threads: usize,
    description: String,
    settings: ProcessorSettings,
}

impl<'a> LocalProcessor<'a> {
    pub fn new(layout: &'a mut Layout, top: CellIndex) -> Self {
        Self {
            layout,
            top,
            threads: 0,
            description: String::new(),
            settings: ProcessorSettings::default(),
        }
    }

    pub fn with_config(layout: &'a mut Layout, top: CellIndex, config: &ProcessorConfig) -> Self {
        let mut p = Self::new(layout, top);
        p.threads = config.threads;
        p.settings.area_ratio = config.area_ratio;
        p.settings.max_vertex_count = config.max_vertex_count;
        p.settings.base_verbosity = config.base_verbosity;
        p
    }

    pub fn layout(&self) -> &Layout {
        self.layout
    }

    pub fn top(&self) -> CellIndex {
        self.top
    }

    /// Worker threads; 0 runs on the calling thread
    pub fn set_threads(&mut self, threads: usize) {
        self.threads = threads;
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn set_area_ratio(&mut self, area_ratio: f64) {
        self.settings.area_ratio = area_ratio;
    }

    pub fn set_max_vertex_count(&mut self, max_vertex_count: usize) {
        self.settings.max_vertex_count = max_vertex_count;
    }

    /// Values above 0 log every context at info level
    pub fn set_base_verbosity(&mut self, verbosity: i32) {
        self.settings.base_verbosity = verbosity;
    }

    pub fn base_verbosity(&self) -> i32 {
        self.settings.base_verbosity
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    /// Run `op` with the shapes of `subject_layer` against the shapes of
    /// `intruder_layers` (layer role = position), writing the result
    /// channels to `output_layers`
    pub fn run<TS, TI, TR>(
        &mut self,
        op: &dyn LocalOperation<TS, TI, TR>,
        subject_layer: LayerIndex,
        intruder_layers: &[LayerIndex],
        output_layers: &[LayerIndex],
    ) -> Result<()>
    where
        TS: HierShape + 'static,
        TI: HierShape + 'static,
        TR: HierShape + FromSubject<TS>,
    {
        ensure!(self.layout.is_valid_cell(self.top), "top cell {} does not exist", self.top);
        for layer in std::iter::once(&subject_layer).chain(intruder_layers).chain(output_layers) {
            ensure!(self.layout.is_valid_layer(*layer), "layer {} does not exist", layer);
        }
        ensure!(
            output_layers.len() == op.output_channels(),
            "{} produces {} result channels, but {} output layers were given",
            op.description(),
            op.output_channels(),
            output_layers.len()
        );

        let start = Instant::now();
        let description = if self.description.is_empty() {
            op.description()
        } else {
            self.description.clone()
        };
        log::info!(
            "[LocalProcessor] {} started on '{}' ({} threads)",
            description,
            self.layout.cell(self.top).name(),
            self.threads
        );

        self.settings.cell_mags.clear();
        if let Some(reducer) = op.vars() {
            let t = Instant::now();
            let mut collector = VariantsCollector::new(reducer);
            collector.collect(self.layout, self.top);
            let table = collector.separate_variants(self.layout);
            self.settings.cell_mags = collector.magnifications();
            let created: usize = table.values().map(|v| v.len().saturating_sub(1)).sum();
            log::info!(
                "[LocalProcessor] Variants by {}: {} cells created in {:?}",
                reducer.description(),
                created,
                t.elapsed()
            );
        }

        let to_store = {
            let layout: &Layout = self.layout;
            let settings = &self.settings;
            let data = LocalData::<TS, TI>::collect(layout, subject_layer, intruder_layers);

            let t = Instant::now();
            let contexts = compute_contexts(layout, settings, self.top, op.dist(), &data);
            let items: Vec<(CellIndex, usize)> = contexts
                .iter()
                .enumerate()
                .filter_map(|(c, cc)| cc.as_ref().map(|cc| (c, cc.len())))
                .flat_map(|(c, n)| (0..n).map(move |k| (c, k)))
                .collect();
            log::info!(
                "[LocalProcessor] Contexts computed: {} (cell, context) pairs in {:?}",
                items.len(),
                t.elapsed()
            );

            // Parallel per-context computation
            let t = Instant::now();
            let compute = |&(c, k): &(CellIndex, usize)| {
                let ctx = contexts[c].as_ref().map(|cc| &cc.contexts[k]);
                ((c, k), compute_context(layout, settings, op, &data, c, ctx))
            };
            let local: HashMap<(CellIndex, usize), Vec<HashSet<TR>>> = if self.threads == 0 {
                items.iter().map(compute).collect()
            } else {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(self.threads)
                    .build()
                    .context("failed to build the worker pool")?;
                pool.install(|| items.par_iter().map(compute).collect())
            };
            log::info!("[LocalProcessor] Local results computed in {:?}", t.elapsed());

            let t = Instant::now();
            let to_store = propagate(layout, op.output_channels(), &contexts, local);
            log::info!("[LocalProcessor] Results propagated in {:?}", t.elapsed());
            to_store
        };

        let mut stored = 0;
        for (cell, channels) in to_store {
            for (results, layer) in channels.into_iter().zip(output_layers) {
                let mut results: Vec<TR> = results.into_iter().collect();
                results.sort();
                stored += results.len();
                let (shapes, repo) = self.layout.shapes_with_repository(cell, *layer);
                for r in &results {
                    r.store(shapes, repo);
                }
            }
        }

        log::info!(
            "[LocalProcessor] {} completed: {} shapes stored in {:?}",
            description,
            stored,
            start.elapsed()
        );
        Ok(())
    }
}

/// Contexts of every cell below `top`, indexed by cell
fn compute_contexts<TS, TI>(
    layout: &Layout,
    settings: &ProcessorSettings,
    top: CellIndex,
    dist: Coord,
    data: &LocalData<TS, TI>,
) -> Vec<Option<CellContexts<TI>>>
where
    TI: HierShape,
{
    let repo = layout.shape_repository();
    let mut contexts: Vec<Option<CellContexts<TI>>> = (0..layout.cells()).map(|_| None).collect();
    contexts[top] = Some(CellContexts::root());

    for parent in layout.cells_top_down() {
        let Some(pc) = contexts[parent].take() else {
            continue;
        };
        let d = settings.dist_for_cell(parent, dist);

        let members: Vec<(CellIndex, ICplxTrans)> = layout
            .cell(parent)
            .insts()
            .iter()
            .flat_map(|inst| inst.transforms().map(move |t| (inst.cell_index, t)))
            .collect();
        let member_scanner = BoxScanner::new(
            members
                .iter()
                .enumerate()
                .map(|(k, (c, t))| (k, t.apply_box(&data.intruder_boxes[*c]))),
        );
        let own = &data.intruders[parent];
        let own_scanner = BoxScanner::new(own.iter().enumerate().map(|(k, (_, s))| (k, s.bbox())));

        for (mi, (child, t)) in members.iter().enumerate() {
            let region = t.apply_box(&data.subject_boxes[*child]);
            if region.is_empty() {
                continue;
            }
            let reach = region.enlarged(d);

            // own shapes and siblings do not depend on the parent context
            let mut base: Vec<(usize, TI)> = own_scanner.query(&region, d).map(|k| own[k].clone()).collect();
            for k in member_scanner.query(&region, d).filter(|k| *k != mi) {
                let (sibling, st) = &members[k];
                collect_flat_intruders(layout, data, *sibling, st, &reach, &mut base);
            }

            let ti = t.inverted();
            for (k, ctx) in pc.contexts.iter().enumerate() {
                let mut key: ContextKey<TI> = base
                    .iter()
                    .chain(ctx.intruders.iter().filter(|(_, s)| s.bbox().touches(&reach)))
                    .map(|(role, s)| (*role, s.transformed(&ti, repo)))
                    .collect();
                key.sort();
                key.dedup();

                let link = ParentLink {
                    parent,
                    context: k,
                    trans: *t,
                };
                contexts[*child]
                    .get_or_insert_with(CellContexts::new)
                    .insert(key, Some(link));
            }
        }

        contexts[parent] = Some(pc);
    }

    contexts
}

/// Results of one cell in one context
fn compute_context<TS, TI, TR>(
    layout: &Layout,
    settings: &ProcessorSettings,
    op: &dyn LocalOperation<TS, TI, TR>,
    data: &LocalData<TS, TI>,
    cell: CellIndex,
    ctx: Option<&CellContext<TI>>,
) -> Vec<HashSet<TR>>
where
    TS: HierShape,
    TI: HierShape,
    TR: HierShape + FromSubject<TS>,
{
    let mut results: Vec<HashSet<TR>> = (0..op.output_channels()).map(|_| HashSet::new()).collect();
    let subjects = &data.subjects[cell];
    if subjects.is_empty() {
        return results;
    }

    let d = settings.dist_for_cell(cell, op.dist());
    let region = subjects
        .iter()
        .fold(BBox::empty(), |b, s| b.union(&s.bbox()))
        .enlarged(d);

    // intruder candidates: (id, role, shape)
    let mut candidates: Vec<(usize, usize, TI)> = Vec::new();
    let mut next_id = subjects.len();
    let mut fresh_id = || {
        next_id += 1;
        next_id - 1
    };

    let mut role_pos = vec![0usize; data.same_layer.len()];
    for (role, s) in &data.intruders[cell] {
        let pos = role_pos[*role];
        role_pos[*role] += 1;
        if !s.bbox().touches(&region) {
            continue;
        }
        let id = if data.same_layer[*role] { pos } else { fresh_id() };
        candidates.push((id, *role, s.clone()));
    }

    let mut flat = Vec::new();
    for inst in layout.cell(cell).insts() {
        for t in inst.transforms() {
            collect_flat_intruders(layout, data, inst.cell_index, &t, &region, &mut flat);
        }
    }
    if let Some(ctx) = ctx {
        flat.extend(ctx.intruders.iter().filter(|(_, s)| s.bbox().touches(&region)).cloned());
    }
    for (role, s) in flat {
        candidates.push((fresh_id(), role, s));
    }

    let scanner = BoxScanner::new(candidates.iter().enumerate().map(|(k, (_, _, s))| (k, s.bbox())));
    let hint = op.on_empty_intruder_hint();
    let pc = op.property_constraint();
    let mut interactions = ShapeInteractions::new();
    for (sid, s) in subjects.iter().enumerate() {
        let hits: Vec<usize> = scanner
            .query(&s.bbox(), d)
            .filter(|k| candidates[*k].0 != sid)
            .collect();

        if hits.is_empty() {
            let channel = match hint {
                OnEmptyIntruderHint::Ignore => None,
                OnEmptyIntruderHint::Drop => continue,
                OnEmptyIntruderHint::Copy => Some(0),
                OnEmptyIntruderHint::CopyToSecond => Some(1),
            };
            if let Some(ch) = channel {
                if let (Some(r), Some(out)) = (TR::from_subject(s), results.get_mut(ch)) {
                    out.insert(r.with_properties_id(pc_norm(pc, s.properties_id())));
                }
                continue;
            }
        }

        interactions.add_subject(sid, s.clone());
        for k in hits {
            let (id, role, shape) = &candidates[k];
            interactions.add_intruder_shape(*id, *role, shape.clone());
            interactions.add_interaction(sid, *id);
        }
    }

    log::log!(
        settings.context_log_level(),
        "[LocalProcessor] Cell '{}': {} subjects, {} intruders, {} computed",
        layout.cell(cell).name(),
        subjects.len(),
        candidates.len(),
        interactions.num_subjects()
    );

    if !interactions.is_empty() {
        op.compute_local(layout, cell, &interactions, &mut results, settings);
    }
    results
}

/// Split the context results into the common part per cell and the
/// context specific rest, which moves up into the parent contexts
fn propagate<TI, TR>(
    layout: &Layout,
    channels: usize,
    contexts: &[Option<CellContexts<TI>>],
    mut totals: HashMap<(CellIndex, usize), Vec<HashSet<TR>>>,
) -> Vec<(CellIndex, Vec<HashSet<TR>>)>
where
    TR: HierShape,
{
    let repo = layout.shape_repository();
    let empty = || (0..channels).map(|_| HashSet::new()).collect::<Vec<HashSet<TR>>>();
    let mut to_store = Vec::new();

    for cell in layout.cells_bottom_up() {
        let Some(cc) = contexts[cell].as_ref() else {
            continue;
        };
        let per_context: Vec<Vec<HashSet<TR>>> = (0..cc.len())
            .map(|k| totals.remove(&(cell, k)).unwrap_or_else(empty))
            .collect();

        let common: Vec<HashSet<TR>> = (0..channels)
            .map(|ch| {
                let mut sets = per_context.iter().map(|r| &r[ch]);
                let first = sets.next().cloned().unwrap_or_default();
                sets.fold(first, |acc, s| acc.intersection(s).cloned().collect())
            })
            .collect();

        for (k, res) in per_context.iter().enumerate() {
            for link in &cc.contexts[k].parents {
                let target = totals.entry((link.parent, link.context)).or_insert_with(empty);
                for ch in 0..channels {
                    for r in res[ch].difference(&common[ch]) {
                        target[ch].insert(r.transformed(&link.trans, repo));
                    }
                }
            }
        }

        if common.iter().any(|s| !s.is_empty()) {
            to_store.push((cell, common));
        }
    }

    to_store
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{box_polygon, Polygon, Vector};
    use crate::layout::{CellInstArray, PolygonRef};
    use crate::ops::BoolAndOrNotLocalOperation;

    fn flat_sorted(layout: &Layout, top: CellIndex, layer: LayerIndex) -> Vec<Polygon> {
        let mut v: Vec<Polygon> = layout.flat_polygons(top, layer).into_iter().map(|(p, _)| p).collect();
        v.sort();
        v
    }

    #[test]
    fn test_context_specific_results_move_up() {
        // CHILD holds a 10x10 square; one instance is partially covered by
        // the intruder in TOP, the other one is free
        let mut layout = Layout::new();
        let a = layout.insert_layer("a");
        let b = layout.insert_layer("b");
        let out = layout.insert_layer("out");
        let top = layout.add_cell("TOP");
        let child = layout.add_cell("CHILD");
        layout.insert_polygon(child, a, &box_polygon(0, 0, 10, 10), 0);
        layout
            .insert_instance(top, CellInstArray::single(child, ICplxTrans::identity()))
            .unwrap();
        layout
            .insert_instance(top, CellInstArray::single(child, ICplxTrans::from_disp(Vector::new(100, 0))))
            .unwrap();
        layout.insert_polygon(top, b, &box_polygon(5, 0, 20, 10), 0);

        let op: BoolAndOrNotLocalOperation<PolygonRef, PolygonRef, PolygonRef> = BoolAndOrNotLocalOperation::new(false);
        let mut proc = LocalProcessor::new(&mut layout, top);
        proc.run(&op, a, &[b], &[out]).unwrap();

        assert_eq!(
            flat_sorted(&layout, top, out),
            vec![box_polygon(0, 0, 5, 10), box_polygon(100, 0, 110, 10)]
        );
        // nothing is common to both contexts of CHILD
        assert!(layout.cell(child).shapes(out).map_or(true, |s| s.is_empty()));
    }

    #[test]
    fn test_common_results_stay_in_cell() {
        let mut layout = Layout::new();
        let a = layout.insert_layer("a");
        let b = layout.insert_layer("b");
        let out = layout.insert_layer("out");
        let top = layout.add_cell("TOP");
        let child = layout.add_cell("CHILD");
        layout.insert_polygon(child, a, &box_polygon(0, 0, 10, 10), 0);
        layout.insert_polygon(child, b, &box_polygon(5, 5, 15, 15), 0);
        layout
            .insert_instance(
                top,
                CellInstArray::array(child, ICplxTrans::identity(), Vector::new(50, 0), Vector::new(0, 50), 2, 2),
            )
            .unwrap();

        let op: BoolAndOrNotLocalOperation<PolygonRef, PolygonRef, PolygonRef> = BoolAndOrNotLocalOperation::new(true);
        let mut proc = LocalProcessor::new(&mut layout, top);
        proc.set_threads(2);
        proc.run(&op, a, &[b], &[out]).unwrap();

        let local: Vec<Polygon> = layout
            .cell(child)
            .shapes(out)
            .map(|s| s.polygons().iter().map(|p| p.obj.instantiate()).collect())
            .unwrap_or_default();
        assert_eq!(local, vec![box_polygon(5, 5, 10, 10)]);
        assert_eq!(flat_sorted(&layout, top, out).len(), 4);
    }

    #[test]
    fn test_bad_arguments() {
        let mut layout = Layout::new();
        let a = layout.insert_layer("a");
        let top = layout.add_cell("TOP");
        let op: BoolAndOrNotLocalOperation<PolygonRef, PolygonRef, PolygonRef> = BoolAndOrNotLocalOperation::new(true);
        let mut proc = LocalProcessor::new(&mut layout, top);
        assert!(proc.run(&op, a, &[7], &[a]).is_err());
        assert!(proc.run(&op, a, &[a], &[a, a]).is_err());
    }

    #[test]
    fn test_dist_for_cell_scales_with_magnification() {
        let mut settings = ProcessorSettings::default();
        settings.cell_mags.insert(3, 2.0);
        assert_eq!(settings.dist_for_cell(3, 10), 5);
        assert_eq!(settings.dist_for_cell(4, 10), 10);
    }
}
