use crate::error::SetupError;

/// One time slice: per-bin intensities plus the scalars derived from them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Column {
    pub intensities: Vec<u8>,
    pub power: f32,
    pub similarity: f32,
    /// Detector state after this column was analysed.
    pub active: bool,
    /// An onset fired on this column.
    pub onset: bool,
}

impl Column {
    fn blank(bins: usize) -> Self {
        Self {
            intensities: vec![0; bins],
            ..Self::default()
        }
    }
}

/// Fixed `width` columns. Each write advances the cursor by exactly one
/// column (wrapping) and overwrites that column; the cursor always names the
/// newest column.
#[derive(Debug, Clone)]
pub struct SpectrogramRing {
    columns: Vec<Column>,
    bins: usize,
    cursor: usize,
}

impl SpectrogramRing {
    pub fn new(width: usize, bins: usize) -> Result<Self, SetupError> {
        if width == 0 || bins == 0 {
            return Err(SetupError::InvalidDimensions {
                width: width as u32,
                height: bins as u32 + 1,
            });
        }
        Ok(Self {
            columns: vec![Column::blank(bins); width],
            bins,
            cursor: width - 1,
        })
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Advance the cursor and hand out the column to overwrite. Its
    /// intensities keep their length; scalars are cleared.
    pub fn advance(&mut self) -> &mut Column {
        self.cursor = (self.cursor + 1) % self.columns.len();
        let column = &mut self.columns[self.cursor];
        column.power = 0.0;
        column.similarity = 0.0;
        column.active = false;
        column.onset = false;
        column
    }

    /// Source column for display column `x`: oldest at 0, newest at
    /// `width - 1`.
    pub fn display_index(&self, x: usize) -> usize {
        (self.cursor + x + 1) % self.columns.len()
    }

    /// All `width` columns in display order, including never-written blanks.
    pub fn display(&self) -> impl Iterator<Item = &Column> + '_ {
        (0..self.columns.len()).map(move |x| &self.columns[self.display_index(x)])
    }

    pub fn clear(&mut self) {
        for column in &mut self.columns {
            *column = Column::blank(self.bins);
        }
        self.cursor = self.columns.len() - 1;
    }
}
