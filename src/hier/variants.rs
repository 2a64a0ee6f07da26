//! Cell variants
//!
//! Some operations do not commute with every part of a cell's placement.
//! A check distance, for example, does not scale with a magnified
//! instance. A `TransformationReducer` extracts the relevant part of a
//! transformation; cells used under different reduced transformations
//! are split into variant cells named `NAME$VAR1`, `NAME$VAR2`, ...

use crate::geometry::{ICplxTrans, Vector};
use crate::layout::{CellIndex, CellInstArray, Layout};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Extracts the part of a transformation an operation depends on
pub trait TransformationReducer: Send + Sync {
    fn reduce(&self, t: &ICplxTrans) -> ICplxTrans;

    fn description(&self) -> &'static str;
}

/// Keeps the magnification
#[derive(Debug, Clone, Copy, Default)]
pub struct MagnificationReducer;

impl TransformationReducer for MagnificationReducer {
    fn reduce(&self, t: &ICplxTrans) -> ICplxTrans {
        ICplxTrans::from_mag(t.mag())
    }

    fn description(&self) -> &'static str {
        "magnification"
    }
}

/// Keeps the orientation
#[derive(Debug, Clone, Copy, Default)]
pub struct OrientationReducer;

impl TransformationReducer for OrientationReducer {
    fn reduce(&self, t: &ICplxTrans) -> ICplxTrans {
        ICplxTrans::from_rot(t.rot())
    }

    fn description(&self) -> &'static str {
        "orientation"
    }
}

/// Keeps magnification and orientation
#[derive(Debug, Clone, Copy, Default)]
pub struct MagnificationAndOrientationReducer;

impl TransformationReducer for MagnificationAndOrientationReducer {
    fn reduce(&self, t: &ICplxTrans) -> ICplxTrans {
        ICplxTrans::new(t.rot(), t.mag(), Vector::default())
    }

    fn description(&self) -> &'static str {
        "magnification and orientation"
    }
}

/// Collects the reduced transformations every cell is used with and
/// separates the cells into variants
pub struct VariantsCollector<'a> {
    reducer: &'a dyn TransformationReducer,
    variants: BTreeMap<CellIndex, BTreeSet<ICplxTrans>>,
    cell_variant: HashMap<CellIndex, ICplxTrans>,
}

impl<'a> VariantsCollector<'a> {
    pub fn new(reducer: &'a dyn TransformationReducer) -> Self {
        Self {
            reducer,
            variants: BTreeMap::new(),
            cell_variant: HashMap::new(),
        }
    }

    /// Collect the variants of `top` and all cells below
    pub fn collect(&mut self, layout: &Layout, top: CellIndex) {
        self.variants.clear();
        self.variants
            .entry(top)
            .or_default()
            .insert(self.reducer.reduce(&ICplxTrans::identity()));

        let mut reachable = layout.called_cells(top);
        reachable.insert(top);

        for ci in layout.cells_top_down() {
            if !reachable.contains(&ci) {
                continue;
            }
            let Some(vars) = self.variants.get(&ci).cloned() else {
                continue;
            };
            for inst in layout.cell(ci).insts() {
                for t in inst.transforms() {
                    for v in &vars {
                        let child = self.reducer.reduce(&v.compose(&t));
                        self.variants.entry(inst.cell_index).or_default().insert(child);
                    }
                }
            }
        }
    }

    /// Reduced transformations of a cell, if the cell is used
    pub fn variants(&self, ci: CellIndex) -> Option<&BTreeSet<ICplxTrans>> {
        self.variants.get(&ci)
    }

    pub fn has_variants(&self) -> bool {
        self.variants.values().any(|v| v.len() > 1)
    }

    /// Create the variant cells and re-point the instances
    ///
    /// Returns the map from original cell to its variants. After this call,
    /// every used cell has exactly one reduced transformation.
    pub fn separate_variants(&mut self, layout: &mut Layout) -> BTreeMap<CellIndex, BTreeMap<ICplxTrans, CellIndex>> {
        let mut var_table: BTreeMap<CellIndex, BTreeMap<ICplxTrans, CellIndex>> = BTreeMap::new();
        self.cell_variant.clear();

        for (&ci, vars) in &self.variants {
            let mut table = BTreeMap::new();
            for (n, v) in vars.iter().enumerate() {
                let target = if n == 0 {
                    ci
                } else {
                    let name = format!("{}$VAR{}", layout.cell(ci).name(), n);
                    layout.clone_cell(ci, name)
                };
                table.insert(*v, target);
                self.cell_variant.insert(target, *v);
            }
            var_table.insert(ci, table);
        }

        if var_table.values().all(|t| t.len() <= 1) {
            return var_table;
        }

        for (&target, var) in &self.cell_variant {
            let insts = layout.cell(target).insts().to_vec();
            let mut new_insts = Vec::with_capacity(insts.len());
            for inst in insts {
                let Some(table) = var_table.get(&inst.cell_index) else {
                    new_insts.push(inst);
                    continue;
                };
                let targets: Vec<(ICplxTrans, CellIndex)> = inst
                    .transforms()
                    .map(|t| {
                        let child = self.reducer.reduce(&var.compose(&t));
                        (t, table.get(&child).copied().unwrap_or(inst.cell_index))
                    })
                    .collect();

                let first = targets.first().map(|(_, c)| *c).unwrap_or(inst.cell_index);
                if targets.iter().all(|(_, c)| *c == first) {
                    new_insts.push(CellInstArray {
                        cell_index: first,
                        ..inst
                    });
                } else {
                    // array members end up in different variants
                    new_insts.extend(targets.into_iter().map(|(t, c)| CellInstArray::single(c, t)));
                }
            }
            *layout.cell_mut(target).insts_mut() = new_insts;
        }

        var_table
    }

    /// The reduced transformation of a cell after `separate_variants`
    pub fn cell_variant(&self, ci: CellIndex) -> Option<&ICplxTrans> {
        self.cell_variant.get(&ci)
    }

    /// Magnification per cell after `separate_variants`
    pub fn magnifications(&self) -> HashMap<CellIndex, f64> {
        self.cell_variant.iter().map(|(c, t)| (*c, t.mag())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{box_polygon, orientation};

    fn layout_with_magnified_instance() -> (Layout, CellIndex, CellIndex) {
        let mut layout = Layout::new();
        let l = layout.insert_layer("metal");
        let top = layout.add_cell("TOP");
        let child = layout.add_cell("CHILD");
        layout.insert_polygon(child, l, &box_polygon(0, 0, 10, 10), 0);
        layout
            .insert_instance(top, CellInstArray::single(child, ICplxTrans::from_disp(Vector::new(100, 0))))
            .unwrap();
        layout
            .insert_instance(top, CellInstArray::single(child, ICplxTrans::new(orientation::R90, 2.0, Vector::new(0, 100))))
            .unwrap();
        (layout, top, child)
    }

    #[test]
    fn test_magnification_variants() {
        let (mut layout, top, child) = layout_with_magnified_instance();
        let reducer = MagnificationReducer;
        let mut vc = VariantsCollector::new(&reducer);
        vc.collect(&layout, top);
        assert_eq!(vc.variants(child).map(|v| v.len()), Some(2));
        assert!(vc.has_variants());

        let table = vc.separate_variants(&mut layout);
        assert_eq!(table[&child].len(), 2);
        let var_cell = layout.cell_by_name("CHILD$VAR1").unwrap();
        assert_eq!(vc.cell_variant(var_cell).map(|t| t.mag()), Some(2.0));

        let targets: Vec<CellIndex> = layout.cell(top).insts().iter().map(|i| i.cell_index).collect();
        assert_eq!(targets, vec![child, var_cell]);
        assert_eq!(vc.magnifications()[&child], 1.0);
    }

    #[test]
    fn test_orientation_only_ignores_displacement() {
        let (layout, top, child) = layout_with_magnified_instance();
        let reducer = OrientationReducer;
        let mut vc = VariantsCollector::new(&reducer);
        vc.collect(&layout, top);
        let vars: Vec<u8> = vc.variants(child).unwrap().iter().map(|t| t.rot()).collect();
        assert_eq!(vars, vec![orientation::R0, orientation::R90]);
    }

    #[test]
    fn test_no_variants_for_uniform_use() {
        let mut layout = Layout::new();
        let top = layout.add_cell("TOP");
        let child = layout.add_cell("CHILD");
        layout
            .insert_instance(
                top,
                CellInstArray::array(child, ICplxTrans::identity(), Vector::new(20, 0), Vector::new(0, 20), 3, 3),
            )
            .unwrap();
        let reducer = MagnificationReducer;
        let mut vc = VariantsCollector::new(&reducer);
        vc.collect(&layout, top);
        assert!(!vc.has_variants());
        let cells_before = layout.cells();
        vc.separate_variants(&mut layout);
        assert_eq!(layout.cells(), cells_before);
    }
}
