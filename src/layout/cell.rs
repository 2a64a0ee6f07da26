//! Cells, instances and the layout container

use crate::geometry::{BBox, EdgePair, ICplxTrans, Polygon, Text, Edge, Vector};
use anyhow::{bail, Context, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::properties::{PropertiesId, PropertiesRepository, PropertyMapper, PropertySet};
use super::shapes::{ShapeRepository, Shapes};

pub type CellIndex = usize;
pub type LayerIndex = usize;

/// A cell instance, optionally a regular `na` x `nb` array
#[derive(Debug, Clone, PartialEq)]
pub struct CellInstArray {
    pub cell_index: CellIndex,
    pub trans: ICplxTrans,
    pub a: Vector,
    pub b: Vector,
    pub na: u32,
    pub nb: u32,
}

impl CellInstArray {
    pub fn single(cell_index: CellIndex, trans: ICplxTrans) -> Self {
        Self {
            cell_index,
            trans,
            a: Vector::default(),
            b: Vector::default(),
            na: 1,
            nb: 1,
        }
    }

    pub fn array(cell_index: CellIndex, trans: ICplxTrans, a: Vector, b: Vector, na: u32, nb: u32) -> Self {
        Self {
            cell_index,
            trans,
            a,
            b,
            na: na.max(1),
            nb: nb.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.na as usize * self.nb as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All member transformations of the array
    pub fn transforms(&self) -> impl Iterator<Item = ICplxTrans> + '_ {
        (0..self.na).flat_map(move |i| {
            (0..self.nb).map(move |j| {
                let d = Vector::new(self.a.x * i as i32 + self.b.x * j as i32, self.a.y * i as i32 + self.b.y * j as i32);
                ICplxTrans::from_disp(d).compose(&self.trans)
            })
        })
    }

    /// Bounding box of the whole array for a given cell box
    pub fn bbox(&self, cell_box: &BBox) -> BBox {
        self.transforms().fold(BBox::empty(), |b, t| b.union(&t.apply_box(cell_box)))
    }
}

#[derive(Debug, Default, Clone)]
pub struct Cell {
    name: String,
    shapes: HashMap<LayerIndex, Shapes>,
    insts: Vec<CellInstArray>,
}

impl Cell {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shapes(&self, layer: LayerIndex) -> Option<&Shapes> {
        self.shapes.get(&layer)
    }

    pub fn shapes_mut(&mut self, layer: LayerIndex) -> &mut Shapes {
        self.shapes.entry(layer).or_default()
    }

    pub fn insts(&self) -> &[CellInstArray] {
        &self.insts
    }

    pub fn insts_mut(&mut self) -> &mut Vec<CellInstArray> {
        &mut self.insts
    }

    pub fn insert(&mut self, inst: CellInstArray) {
        self.insts.push(inst);
    }

    pub fn is_leaf(&self) -> bool {
        self.insts.is_empty()
    }
}

/// The cell hierarchy with its shared repositories
#[derive(Debug, Default)]
pub struct Layout {
    cells: Vec<Cell>,
    layers: Vec<String>,
    shape_repository: ShapeRepository,
    properties: Mutex<PropertiesRepository>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cell(&mut self, name: impl Into<String>) -> CellIndex {
        self.cells.push(Cell::new(name));
        self.cells.len() - 1
    }

    pub fn cells(&self) -> usize {
        self.cells.len()
    }

    pub fn cell(&self, ci: CellIndex) -> &Cell {
        &self.cells[ci]
    }

    pub fn cell_mut(&mut self, ci: CellIndex) -> &mut Cell {
        &mut self.cells[ci]
    }

    pub fn is_valid_cell(&self, ci: CellIndex) -> bool {
        ci < self.cells.len()
    }

    pub fn cell_by_name(&self, name: &str) -> Option<CellIndex> {
        self.cells.iter().position(|c| c.name == name)
    }

    pub fn insert_layer(&mut self, name: impl Into<String>) -> LayerIndex {
        self.layers.push(name.into());
        self.layers.len() - 1
    }

    pub fn layers(&self) -> usize {
        self.layers.len()
    }

    pub fn is_valid_layer(&self, layer: LayerIndex) -> bool {
        layer < self.layers.len()
    }

    pub fn layer_by_name(&self, name: &str) -> Option<LayerIndex> {
        self.layers.iter().position(|l| l == name)
    }

    pub fn layer_name(&self, layer: LayerIndex) -> Option<&str> {
        self.layers.get(layer).map(|s| s.as_str())
    }

    pub fn shape_repository(&self) -> &ShapeRepository {
        &self.shape_repository
    }

    /// Locked access to the property repository
    pub fn properties(&self) -> MutexGuard<'_, PropertiesRepository> {
        self.properties.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn properties_id(&self, set: &PropertySet) -> PropertiesId {
        self.properties().properties_id(set)
    }

    pub fn insert_polygon(&mut self, ci: CellIndex, layer: LayerIndex, poly: &Polygon, prop_id: PropertiesId) {
        let Layout {
            cells,
            shape_repository,
            ..
        } = self;
        cells[ci].shapes_mut(layer).insert_polygon(poly, prop_id, shape_repository);
    }

    pub fn insert_edge(&mut self, ci: CellIndex, layer: LayerIndex, e: Edge, prop_id: PropertiesId) {
        self.cells[ci].shapes_mut(layer).insert_edge(e, prop_id);
    }

    pub fn insert_edge_pair(&mut self, ci: CellIndex, layer: LayerIndex, ep: EdgePair, prop_id: PropertiesId) {
        self.cells[ci].shapes_mut(layer).insert_edge_pair(ep, prop_id);
    }

    pub fn insert_text(&mut self, ci: CellIndex, layer: LayerIndex, t: Text, prop_id: PropertiesId) {
        self.cells[ci].shapes_mut(layer).insert_text(t, prop_id);
    }

    pub fn insert_instance(&mut self, parent: CellIndex, inst: CellInstArray) -> Result<()> {
        if !self.is_valid_cell(inst.cell_index) {
            bail!("instance refers to unknown cell {}", inst.cell_index);
        }
        if inst.cell_index == parent || self.called_cells(inst.cell_index).contains(&parent) {
            bail!(
                "instance of '{}' in '{}' would create a recursive hierarchy",
                self.cells[inst.cell_index].name,
                self.cells[parent].name
            );
        }
        self.cells[parent].insert(inst);
        Ok(())
    }

    /// All cells called directly or indirectly from `ci`
    pub fn called_cells(&self, ci: CellIndex) -> HashSet<CellIndex> {
        let mut seen = HashSet::new();
        let mut todo = vec![ci];
        while let Some(c) = todo.pop() {
            for inst in &self.cells[c].insts {
                if seen.insert(inst.cell_index) {
                    todo.push(inst.cell_index);
                }
            }
        }
        seen
    }

    /// Direct parents of a cell
    pub fn parent_cells(&self, ci: CellIndex) -> Vec<CellIndex> {
        let mut parents: Vec<CellIndex> = self
            .cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.insts.iter().any(|i| i.cell_index == ci))
            .map(|(p, _)| p)
            .collect();
        parents.dedup();
        parents
    }

    pub fn top_cells(&self) -> Vec<CellIndex> {
        let called: HashSet<CellIndex> = self
            .cells
            .iter()
            .flat_map(|c| c.insts.iter().map(|i| i.cell_index))
            .collect();
        (0..self.cells.len()).filter(|c| !called.contains(c)).collect()
    }

    /// Cells ordered so that every parent comes before its children
    pub fn cells_top_down(&self) -> Vec<CellIndex> {
        let mut order = self.cells_bottom_up();
        order.reverse();
        order
    }

    /// Cells ordered so that every child comes before its parents
    pub fn cells_bottom_up(&self) -> Vec<CellIndex> {
        let mut order = Vec::with_capacity(self.cells.len());
        let mut done = vec![false; self.cells.len()];
        for top in 0..self.cells.len() {
            self.post_order(top, &mut done, &mut order);
        }
        order
    }

    fn post_order(&self, ci: CellIndex, done: &mut [bool], order: &mut Vec<CellIndex>) {
        if done[ci] {
            return;
        }
        done[ci] = true;
        for inst in &self.cells[ci].insts {
            self.post_order(inst.cell_index, done, order);
        }
        order.push(ci);
    }

    /// Hierarchical bounding box of every cell on the given layers
    pub fn cell_bboxes(&self, layers: &[LayerIndex]) -> Vec<BBox> {
        let mut boxes = vec![BBox::empty(); self.cells.len()];
        for ci in self.cells_bottom_up() {
            let cell = &self.cells[ci];
            let mut b = layers
                .iter()
                .filter_map(|l| cell.shapes(*l))
                .fold(BBox::empty(), |b, s| b.union(&s.bbox()));
            for inst in &cell.insts {
                b = b.union(&inst.bbox(&boxes[inst.cell_index]));
            }
            boxes[ci] = b;
        }
        boxes
    }

    /// Mutable shapes of a cell layer together with the polygon repository
    pub fn shapes_with_repository(&mut self, ci: CellIndex, layer: LayerIndex) -> (&mut Shapes, &ShapeRepository) {
        let Layout {
            cells,
            shape_repository,
            ..
        } = self;
        (cells[ci].shapes_mut(layer), shape_repository)
    }

    /// Copy a cell's shapes and instances into a new cell
    pub fn clone_cell(&mut self, ci: CellIndex, name: impl Into<String>) -> CellIndex {
        let mut c = self.cells[ci].clone();
        c.name = name.into();
        self.cells.push(c);
        self.cells.len() - 1
    }

    /// Copy the shapes of another layout's cell and layer, mapping property ids
    pub fn copy_shapes_from(
        &mut self,
        source: &Layout,
        source_cell: CellIndex,
        source_layer: LayerIndex,
        ci: CellIndex,
        layer: LayerIndex,
    ) -> Result<()> {
        if !source.is_valid_cell(source_cell) {
            bail!("source cell {} does not exist", source_cell);
        }
        let mapper = PropertyMapper::new(&source.properties(), &mut self.properties());
        let Some(src) = source.cell(source_cell).shapes(source_layer) else {
            return Ok(());
        };
        let Layout {
            cells,
            shape_repository,
            ..
        } = self;
        let dst = cells
            .get_mut(ci)
            .with_context(|| format!("target cell {} does not exist", ci))?
            .shapes_mut(layer);
        for p in src.polygons() {
            dst.insert_polygon(&p.obj.instantiate(), mapper.map(p.prop_id), shape_repository);
        }
        for e in src.edges() {
            dst.insert_edge(e.obj, mapper.map(e.prop_id));
        }
        for ep in src.edge_pairs() {
            dst.insert_edge_pair(ep.obj, mapper.map(ep.prop_id));
        }
        for t in src.texts() {
            dst.insert_text(t.obj.clone(), mapper.map(t.prop_id));
        }
        Ok(())
    }

    /// Flattened polygons of a cell's subtree on one layer
    pub fn flat_polygons(&self, ci: CellIndex, layer: LayerIndex) -> Vec<(Polygon, PropertiesId)> {
        let mut out = Vec::new();
        self.collect_flat(ci, layer, &ICplxTrans::identity(), &mut out);
        out
    }

    fn collect_flat(&self, ci: CellIndex, layer: LayerIndex, t: &ICplxTrans, out: &mut Vec<(Polygon, PropertiesId)>) {
        let cell = &self.cells[ci];
        if let Some(s) = cell.shapes(layer) {
            for p in s.polygons() {
                out.push((p.obj.instantiate().transformed(t), p.prop_id));
            }
        }
        for inst in &cell.insts {
            for it in inst.transforms() {
                self.collect_flat(inst.cell_index, layer, &t.compose(&it), out);
            }
        }
    }

    /// Flattened edge pairs of a cell's subtree on one layer
    pub fn flat_edge_pairs(&self, ci: CellIndex, layer: LayerIndex) -> Vec<EdgePair> {
        let mut out = Vec::new();
        let mut todo = vec![(ci, ICplxTrans::identity())];
        while let Some((c, t)) = todo.pop() {
            let cell = &self.cells[c];
            if let Some(s) = cell.shapes(layer) {
                out.extend(s.edge_pairs().iter().map(|ep| {
                    let first = Edge::new(t.apply(ep.obj.first.p1), t.apply(ep.obj.first.p2));
                    let second = Edge::new(t.apply(ep.obj.second.p1), t.apply(ep.obj.second.p2));
                    if ep.obj.symmetric {
                        EdgePair::symmetric(first, second)
                    } else {
                        EdgePair::new(first, second)
                    }
                }));
            }
            for inst in &cell.insts {
                for it in inst.transforms() {
                    todo.push((inst.cell_index, t.compose(&it)));
                }
            }
        }
        out
    }
}
