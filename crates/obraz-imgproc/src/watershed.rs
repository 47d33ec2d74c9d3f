use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Instant;

use obraz_image::{Image, ImageError, ImageSize};

const NEIGHBORS_4: [(i64, i64); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

const NEIGHBORS_8: [(i64, i64); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Pixel adjacency used while flooding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Connectivity {
    /// Horizontal and vertical neighbours.
    Four,
    /// Horizontal, vertical and diagonal neighbours.
    #[default]
    Eight,
}

impl Connectivity {
    /// Select the connectivity from a neighbour count; anything but 4 means 8.
    pub fn from_neighbors(neighbors: usize) -> Self {
        match neighbors {
            4 => Connectivity::Four,
            _ => Connectivity::Eight,
        }
    }

    fn offsets(&self) -> &'static [(i64, i64)] {
        match self {
            Connectivity::Four => &NEIGHBORS_4,
            Connectivity::Eight => &NEIGHBORS_8,
        }
    }
}

/// The state of a pixel in the label grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// Not reached yet.
    Unassigned,
    /// Queued at the current flooding level.
    Mask,
    /// A watershed line pixel between two or more regions.
    Boundary,
    /// Part of the catchment basin with the given id (starting at 1).
    Region(u32),
}

impl Label {
    /// The integer encoding of the label.
    ///
    /// `Unassigned` and `Boundary` are 0, a region is its id and `Mask` is -2, which no
    /// region id can take.
    pub fn raw(&self) -> i64 {
        match self {
            Label::Unassigned | Label::Boundary => 0,
            Label::Mask => -2,
            Label::Region(id) => *id as i64,
        }
    }
}

/// The result of a watershed segmentation.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    size: ImageSize,
    labels: Vec<Label>,
    num_regions: u32,
}

impl LabelMap {
    /// Size of the segmented image.
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// The label of the pixel at `(x, y)`, `None` outside the image.
    pub fn get(&self, x: usize, y: usize) -> Option<Label> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        Some(self.labels[y * self.size.width + x])
    }

    /// All labels in row-major order.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Number of regions; region ids run from 1 to this value.
    pub fn num_regions(&self) -> u32 {
        self.num_regions
    }

    /// Number of watershed line pixels.
    pub fn boundary_count(&self) -> usize {
        self.labels
            .iter()
            .filter(|&&l| l == Label::Boundary)
            .count()
    }

    /// Render the segmentation.
    ///
    /// Watershed lines are red, region `id` is the gray level `id * 255 / max_id` and any
    /// other pixel is black.
    pub fn render(&self) -> Result<Image<u8, 3>, ImageError> {
        let max_id = self.num_regions.max(1) as u64;
        let data = self
            .labels
            .iter()
            .flat_map(|label| match label {
                Label::Boundary => [255, 0, 0],
                Label::Region(id) => [(*id as u64 * 255 / max_id) as u8; 3],
                Label::Unassigned | Label::Mask => [0, 0, 0],
            })
            .collect();
        Image::new(self.size, data)
    }
}

/// Vincent–Soille watershed segmentation by immersion simulation.
///
/// Pixels are flooded in increasing intensity order, level by level. Inside a level the
/// basins grow breadth first from the pixels touching an existing basin, so that a pixel
/// reached by two basins at the same distance becomes a watershed line. Level pixels not
/// reached by any basin start new basins.
///
/// # Example
///
/// ```
/// use obraz_image::Image;
/// use obraz_imgproc::watershed::{Connectivity, Label, Watershed};
///
/// // two valleys separated by a ridge in the middle column
/// let image = Image::<u8, 1>::new([7, 1].into(), vec![0, 1, 2, 3, 2, 1, 0]).unwrap();
///
/// let labels = Watershed::new(Connectivity::Four).segment(&image).unwrap();
/// assert_eq!(labels.num_regions(), 2);
/// assert_eq!(labels.get(3, 0), Some(Label::Boundary));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Watershed {
    connectivity: Connectivity,
    cancel: Option<Arc<AtomicBool>>,
}

impl Watershed {
    /// Create a segmenter with the given connectivity.
    pub fn new(connectivity: Connectivity) -> Self {
        Self {
            connectivity,
            cancel: None,
        }
    }

    /// Abort the segmentation when `token` becomes `true`.
    ///
    /// The token is polled once per intensity level.
    pub fn with_cancel_token(mut self, token: Arc<AtomicBool>) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The connectivity used by the segmenter.
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Segment an image, using its first channel as intensity.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::Cancelled`] if the cancel token was raised.
    pub fn segment<const C: usize>(&self, src: &Image<u8, C>) -> Result<LabelMap, ImageError> {
        let started = Instant::now();

        let intensity: Vec<u8> = src.as_slice().iter().step_by(C.max(1)).copied().collect();
        let sorted = sort_by_intensity(&intensity);

        let mut flood = Flood {
            cols: src.cols(),
            offsets: self.connectivity.offsets(),
            intensity: &intensity,
            labels: vec![Label::Unassigned; intensity.len()],
            distances: vec![0; intensity.len()],
        };

        let minima = flood.mark_minima(&sorted);
        let num_regions = flood.immerse(&sorted, self.cancel.as_deref())?;

        let labels = LabelMap {
            size: src.size(),
            labels: flood.labels,
            num_regions,
        };

        log::debug!(
            "watershed: {} local minima, {} regions, {} boundary pixels in {:?}",
            minima,
            labels.num_regions(),
            labels.boundary_count(),
            started.elapsed()
        );

        Ok(labels)
    }

    /// Segment `src` and render the result into `dst`.
    ///
    /// `dst` is not modified if the segmentation fails or is cancelled.
    ///
    /// PRECONDITION: `src` and `dst` must have the same size.
    pub fn apply<const C: usize>(
        &self,
        src: &Image<u8, C>,
        dst: &mut Image<u8, 3>,
    ) -> Result<(), ImageError> {
        if src.size() != dst.size() {
            return Err(ImageError::InvalidImageSize(
                src.cols(),
                src.rows(),
                dst.cols(),
                dst.rows(),
            ));
        }

        let rendered = self.segment(src)?.render()?;
        dst.as_slice_mut().copy_from_slice(rendered.as_slice());

        Ok(())
    }
}

/// Segment an image with the watershed transform and render the result.
///
/// # Arguments
///
/// * `src` - The source image; the first channel is the intensity.
/// * `dst` - The destination RGB image.
/// * `connectivity` - The pixel adjacency.
///
/// PRECONDITION: `src` and `dst` must have the same size.
pub fn watershed<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, 3>,
    connectivity: Connectivity,
) -> Result<(), ImageError> {
    Watershed::new(connectivity).apply(src, dst)
}

/// Pixel indices in ascending intensity, ties in row-major order.
fn sort_by_intensity(intensity: &[u8]) -> Vec<usize> {
    let mut starts = [0usize; 257];
    for &v in intensity {
        starts[v as usize + 1] += 1;
    }
    for i in 1..starts.len() {
        starts[i] += starts[i - 1];
    }

    let mut sorted = vec![0; intensity.len()];
    for (idx, &v) in intensity.iter().enumerate() {
        sorted[starts[v as usize]] = idx;
        starts[v as usize] += 1;
    }
    sorted
}

struct Flood<'a> {
    cols: usize,
    offsets: &'static [(i64, i64)],
    intensity: &'a [u8],
    labels: Vec<Label>,
    distances: Vec<u32>,
}

impl Flood<'_> {
    fn neighbors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let cols = self.cols as i64;
        let rows = (self.labels.len() / self.cols.max(1)) as i64;
        let (x, y) = ((idx % self.cols) as i64, (idx / self.cols) as i64);
        self.offsets.iter().filter_map(move |&(dx, dy)| {
            let (nx, ny) = (x + dx, y + dy);
            (nx >= 0 && ny >= 0 && nx < cols && ny < rows).then(|| (ny * cols + nx) as usize)
        })
    }

    /// Mark every pixel and give each local minimum its own id.
    fn mark_minima(&mut self, sorted: &[usize]) -> u32 {
        let mut count = 0;
        for &p in sorted {
            let is_minimum = self
                .neighbors(p)
                .all(|n| self.intensity[n] >= self.intensity[p]);
            self.labels[p] = if is_minimum {
                count += 1;
                self.distances[p] = 0;
                Label::Region(count)
            } else {
                Label::Mask
            };
        }
        count
    }

    /// Flood all levels, returning the number of regions.
    fn immerse(&mut self, sorted: &[usize], cancel: Option<&AtomicBool>) -> Result<u32, ImageError> {
        let mut next_label = 0;
        let mut queue = VecDeque::new();

        let mut start = 0;
        while start < sorted.len() {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                return Err(ImageError::Cancelled);
            }

            let level = self.intensity[sorted[start]];
            let len = sorted[start..]
                .iter()
                .take_while(|&&p| self.intensity[p] == level)
                .count();
            let pixels = &sorted[start..start + len];
            start += len;

            for &p in pixels {
                self.labels[p] = Label::Mask;
            }
            for &p in pixels {
                let touches_basin = self
                    .neighbors(p)
                    .any(|n| matches!(self.labels[n], Label::Region(_) | Label::Boundary));
                if touches_basin {
                    self.distances[p] = 1;
                    queue.push_back(Some(p));
                }
            }

            self.extend_basins(&mut queue, level);

            for &p in pixels {
                self.distances[p] = 0;
            }

            for &p in pixels {
                if self.labels[p] == Label::Mask {
                    next_label += 1;
                    self.fill(p, level, next_label);
                }
            }
        }

        Ok(next_label)
    }

    /// Grow the basins breadth first over the masked pixels of `level`.
    ///
    /// `None` in the queue separates two distances.
    fn extend_basins(&mut self, queue: &mut VecDeque<Option<usize>>, level: u8) {
        let mut current_distance = 1;
        queue.push_back(None);

        while let Some(item) = queue.pop_front() {
            let Some(p) = item else {
                if queue.is_empty() {
                    break;
                }
                queue.push_back(None);
                current_distance += 1;
                continue;
            };

            let mut basin = None;
            let mut on_line = false;
            let neighbors: Vec<usize> = self.neighbors(p).collect();
            for n in neighbors {
                match self.labels[n] {
                    Label::Region(id) if self.distances[n] < current_distance => match basin {
                        None => basin = Some(id),
                        Some(b) if b != id => on_line = true,
                        Some(_) => {}
                    },
                    Label::Mask if self.distances[n] == 0 && self.intensity[n] == level => {
                        self.distances[n] = current_distance + 1;
                        queue.push_back(Some(n));
                    }
                    _ => {}
                }
            }

            if on_line {
                self.labels[p] = Label::Boundary;
            } else if let Some(id) = basin {
                self.labels[p] = Label::Region(id);
            }
        }
    }

    /// Label the masked pixels of `level` connected to `seed` with `label`.
    fn fill(&mut self, seed: usize, level: u8, label: u32) {
        let mut queue = VecDeque::from([seed]);
        self.labels[seed] = Label::Region(label);

        while let Some(p) = queue.pop_front() {
            let neighbors: Vec<usize> = self.neighbors(p).collect();
            for n in neighbors {
                if self.labels[n] == Label::Mask && self.intensity[n] == level {
                    self.labels[n] = Label::Region(label);
                    queue.push_back(n);
                }
            }
        }
    }
}
