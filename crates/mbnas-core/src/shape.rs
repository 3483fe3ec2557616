use std::fmt;

// Shape — dimension sizes of a block tensor
//
// Activations are [N, C, H, W] and conv weights [C_out, C_in/groups, kH, kW].
// The channel shuffle is the one 5-D user: it views [N, C, H, W] as
// [N, G, C/G, H, W] to swap the group axis.

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Shape(dims)
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Product of the dimensions. Zero when any dimension is zero (e.g. an
    /// expansion of 0 gives an empty inner stage).
    pub fn elem_count(&self) -> usize {
        self.0.iter().product()
    }

    /// Row-major strides: the last axis moves by one element, each earlier
    /// axis by the size of everything after it.
    pub fn stride_contiguous(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.rank()];
        let mut step = 1;
        for (stride, &dim) in strides.iter_mut().zip(&self.0).rev() {
            *stride = step;
            step *= dim;
        }
        strides
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.0.iter().map(usize::to_string).collect();
        write!(f, "[{}]", dims.join(", "))
    }
}

// Tuple conversions for the ranks the runtime builds: bias/statistics
// vectors, 2-D views in tests, NCHW activations and the 5-D shuffle view.

impl From<(usize,)> for Shape {
    fn from((c,): (usize,)) -> Self {
        Shape(vec![c])
    }
}

impl From<(usize, usize)> for Shape {
    fn from((a, b): (usize, usize)) -> Self {
        Shape(vec![a, b])
    }
}

impl From<(usize, usize, usize, usize)> for Shape {
    fn from((n, c, h, w): (usize, usize, usize, usize)) -> Self {
        Shape(vec![n, c, h, w])
    }
}

impl From<(usize, usize, usize, usize, usize)> for Shape {
    fn from((n, g, cg, h, w): (usize, usize, usize, usize, usize)) -> Self {
        Shape(vec![n, g, cg, h, w])
    }
}
