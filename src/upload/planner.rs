/// Part size used when the caller does not ask for a specific part count (5MB)
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Smallest number of parts an upload is split into
pub const MIN_PARTS: u32 = 1;

/// Largest number of parts an upload is split into
pub const MAX_PARTS: u32 = 100;

/// Byte range of a single part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    /// 1-based part number
    pub part_number: u32,
    pub start: u64,
    pub length: u64,
}

impl PartRange {
    pub fn end(&self) -> u64 {
        self.start + self.length
    }
}

/// How a file is split into parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartPlan {
    pub part_count: u32,
    /// Size of every part but the last
    pub chunk_size: u64,
    pub parts: Vec<PartRange>,
}

impl PartPlan {
    pub fn total_bytes(&self) -> u64 {
        self.parts.iter().map(|p| p.length).sum()
    }
}

/// Split `file_size` bytes into parts
///
/// With no requested count (or zero) the file is cut into 5MB chunks. The
/// count is clamped to 1..=100, every part gets `ceil(file_size / count)`
/// bytes and the last one takes what is left.
pub fn plan(file_size: u64, requested_parts: Option<u32>) -> PartPlan {
    let part_count = match requested_parts {
        Some(n) if n > 0 => n,
        _ => u32::try_from(file_size.div_ceil(DEFAULT_CHUNK_SIZE)).unwrap_or(u32::MAX),
    }
    .clamp(MIN_PARTS, MAX_PARTS);

    let chunk_size = file_size.div_ceil(part_count as u64);

    let parts = (0..part_count)
        .map(|i| {
            let start = (i as u64 * chunk_size).min(file_size);
            let end = (start + chunk_size).min(file_size);
            PartRange {
                part_number: i + 1,
                start,
                length: end - start,
            }
        })
        .collect();

    PartPlan {
        part_count,
        chunk_size,
        parts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    fn assert_plan_invariants(plan: &PartPlan, file_size: u64) {
        assert_eq!(plan.parts.len(), plan.part_count as usize);
        assert_eq!(plan.total_bytes(), file_size);

        let (last, rest) = plan.parts.split_last().unwrap();
        for part in rest {
            assert_eq!(part.length, plan.chunk_size);
        }
        assert!(last.length <= plan.chunk_size);

        for (i, part) in plan.parts.iter().enumerate() {
            assert_eq!(part.part_number, i as u32 + 1);
        }
        for pair in plan.parts.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start);
        }
    }

    #[test]
    fn test_default_part_count() {
        for (file_size, expected) in [
            (1, 1),
            (5 * MB - 1, 1),
            (5 * MB, 1),
            (5 * MB + 1, 2),
            (12 * MB, 3),
            (500 * MB, 100),
            (501 * MB, 100),
            (10 * 1024 * MB, 100),
        ] {
            let plan = plan(file_size, None);
            assert_eq!(plan.part_count, expected, "file size {}", file_size);
            assert_plan_invariants(&plan, file_size);
        }
    }

    #[test]
    fn test_zero_requested_means_unset() {
        assert_eq!(plan(12 * MB, Some(0)), plan(12 * MB, None));
    }

    #[test]
    fn test_requested_parts_split_evenly() {
        let plan = plan(6 * MB, Some(2));
        assert_eq!(plan.part_count, 2);
        assert_eq!(plan.chunk_size, 3 * MB);
        assert_eq!(
            plan.parts,
            vec![
                PartRange {
                    part_number: 1,
                    start: 0,
                    length: 3 * MB
                },
                PartRange {
                    part_number: 2,
                    start: 3 * MB,
                    length: 3 * MB
                },
            ]
        );
    }

    #[test]
    fn test_last_part_absorbs_remainder() {
        let plan = plan(10, Some(3));
        assert_eq!(plan.chunk_size, 4);
        assert_eq!(
            plan.parts.iter().map(|p| p.length).collect::<Vec<_>>(),
            vec![4, 4, 2]
        );
        assert_plan_invariants(&plan, 10);
    }

    #[test]
    fn test_requested_parts_clamped() {
        let plan = plan(1000 * MB, Some(250));
        assert_eq!(plan.part_count, MAX_PARTS);
        assert_plan_invariants(&plan, 1000 * MB);
    }

    #[test]
    fn test_more_parts_than_bytes() {
        let plan = plan(3, Some(5));
        assert_eq!(plan.part_count, 5);
        assert_eq!(
            plan.parts.iter().map(|p| p.length).collect::<Vec<_>>(),
            vec![1, 1, 1, 0, 0]
        );
        assert_eq!(plan.total_bytes(), 3);
    }

    #[test]
    fn test_zero_length_file() {
        let plan = plan(0, None);
        assert_eq!(plan.part_count, 1);
        assert_eq!(plan.chunk_size, 0);
        assert_eq!(plan.parts[0].length, 0);
    }

    #[test]
    fn test_plan_is_deterministic() {
        for size in [1, 7 * MB + 3, 123 * MB] {
            assert_eq!(plan(size, None), plan(size, None));
            assert_eq!(plan(size, Some(7)), plan(size, Some(7)));
        }
    }
}
