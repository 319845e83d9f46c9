use std::ops::{Index, IndexMut};

/// Named rows of per-location values, one row per variable, each `nlocs` long.
///
/// Used for the QC flags of an observation space: rows are keyed by the expanded names of the
/// simulated variables (see [`Variables::names`](crate::variables::Variables::names)).
#[derive(Debug, Clone, PartialEq)]
pub struct ObsDataVector<T> {
    names: Vec<String>,
    rows: Vec<Vec<T>>,
    nlocs: usize,
}

impl<T: Clone> ObsDataVector<T> {
    /// One row per name, every element set to `fill`.
    pub fn new<S: AsRef<str>>(names: &[S], nlocs: usize, fill: T) -> Self {
        ObsDataVector {
            names: names.iter().map(|s| s.as_ref().to_string()).collect(),
            rows: vec![vec![fill; nlocs]; names.len()],
            nlocs,
        }
    }
}

impl<T> ObsDataVector<T> {
    /// Build from explicit rows.
    ///
    /// Panics
    /// ----------
    /// * if the number of names and rows differ or the rows do not share one length.
    pub fn from_rows<S: AsRef<str>>(names: &[S], rows: Vec<Vec<T>>) -> Self {
        assert_eq!(names.len(), rows.len(), "one row per variable name is required");
        let nlocs = rows.first().map_or(0, Vec::len);
        assert!(
            rows.iter().all(|row| row.len() == nlocs),
            "all rows of an ObsDataVector must have the same length"
        );
        ObsDataVector {
            names: names.iter().map(|s| s.as_ref().to_string()).collect(),
            rows,
            nlocs,
        }
    }

    pub fn nvars(&self) -> usize {
        self.rows.len()
    }

    pub fn nlocs(&self) -> usize {
        self.nlocs
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Row index of `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn row(&self, name: &str) -> Option<&[T]> {
        self.find(name).map(|i| self.rows[i].as_slice())
    }

    pub fn row_mut(&mut self, name: &str) -> Option<&mut [T]> {
        self.find(name).map(move |i| self.rows[i].as_mut_slice())
    }
}

impl<T> Index<usize> for ObsDataVector<T> {
    type Output = [T];

    fn index(&self, ivar: usize) -> &[T] {
        &self.rows[ivar]
    }
}

impl<T> IndexMut<usize> for ObsDataVector<T> {
    fn index_mut(&mut self, ivar: usize) -> &mut [T] {
        &mut self.rows[ivar]
    }
}
