/// Sector data structures

/// Sector status classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorStatus {
    /// Contains only zero bytes
    Blank,
    /// Contains only a single repeated non-zero byte
    Filled,
    /// Contains data (in use)
    InUse,
}

impl std::fmt::Display for SectorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SectorStatus::Blank => write!(f, "Blank"),
            SectorStatus::Filled => write!(f, "Filled"),
            SectorStatus::InUse => write!(f, "In Use"),
        }
    }
}

/// A fixed-length disk sector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sector {
    data: Vec<u8>,
}

impl Sector {
    /// Create a zero-filled sector
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    /// Create a sector with specific data
    pub fn with_data(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Get a reference to the sector data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replace the sector data in one step
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
    }

    /// Sector length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the sector holds no bytes at all
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Analyze the sector status based on data content
    pub fn status(&self) -> SectorStatus {
        match self.data.first() {
            None => SectorStatus::Blank,
            Some(&first) if self.data.iter().all(|&b| b == first) => {
                if first == 0 {
                    SectorStatus::Blank
                } else {
                    SectorStatus::Filled
                }
            }
            Some(_) => SectorStatus::InUse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sector() {
        let sector = Sector::new(128);
        assert_eq!(sector.len(), 128);
        assert_eq!(sector.status(), SectorStatus::Blank);
    }

    #[test]
    fn test_sector_status_filled() {
        let sector = Sector::with_data(vec![0xFF; 128]);
        assert_eq!(sector.status(), SectorStatus::Filled);
    }

    #[test]
    fn test_sector_status_in_use() {
        let sector = Sector::with_data(vec![0x00, 0x01, 0x02, 0x03]);
        assert_eq!(sector.status(), SectorStatus::InUse);
    }

    #[test]
    fn test_set_data() {
        let mut sector = Sector::new(128);
        sector.set_data(vec![0x42; 128]);
        assert!(sector.data().iter().all(|&b| b == 0x42));
    }
}
