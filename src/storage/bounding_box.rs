use serde::{Deserialize, Serialize};

///
/// Axis aligned box mapping unit coordinates onto the real domain.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox
{
    pub lower: Vec<f64>,
    pub upper: Vec<f64>
}

impl Default for BoundingBox
{
    #[inline]
    fn default() -> Self {
        Self { lower: vec![], upper: vec![] }
    }
}

impl BoundingBox
{
    #[inline]
    pub fn new(lower: &[f64], upper: &[f64]) -> Self
    {
        Self { lower: lower.to_vec(), upper: upper.to_vec() }
    }

    /// Unit hypercube.
    pub fn with_dim(dim: usize) -> Self
    {
        Self { lower: vec![0.0; dim], upper: vec![1.0; dim] }
    }

    #[inline]
    pub fn dim(&self) -> usize
    {
        self.lower.len()
    }

    #[inline]
    pub fn width(&self, dim: usize) -> f64
    {
        self.upper[dim] - self.lower[dim]
    }

    ///
    /// Volume of hypercube (width(dim1)*...*width(dim_n))
    ///
    #[inline]
    pub fn volume(&self) -> f64
    {
        (0..self.dim()).map(|d| self.width(d)).product()
    }

    pub fn is_unit_cube(&self) -> bool
    {
        self.lower.iter().all(|&l| l == 0.0) && self.upper.iter().all(|&u| u == 1.0)
    }

    #[inline]
    pub fn to_unit_coordinate(&self, point: &[f64]) -> Vec<f64>
    {
        point.iter().enumerate().map(|(d, &x)| (x - self.lower[d]) / self.width(d)).collect()
    }

    #[inline]
    pub fn to_real_coordinate(&self, point: &[f64]) -> Vec<f64>
    {
        let mut r = point.to_vec();
        self.to_real_coordinate_in_place(&mut r);
        r
    }

    #[inline]
    pub fn to_real_coordinate_in_place(&self, point: &mut [f64])
    {
        for (d, x) in point.iter_mut().enumerate()
        {
            *x = self.lower[d] + self.width(d) * *x;
        }
    }

    #[inline]
    pub fn contains(&self, point: &[f64]) -> bool
    {
        point.iter().enumerate().all(|(d, &x)| self.lower[d] <= x && x <= self.upper[d])
    }
}

#[test]
fn test_bounding_box_mapping()
{
    let bbox = BoundingBox::new(&[-1.0, 2.0], &[1.0, 6.0]);
    assert_eq!(bbox.dim(), 2);
    assert_eq!(bbox.volume(), 8.0);
    assert!(!bbox.is_unit_cube());
    assert!(BoundingBox::with_dim(3).is_unit_cube());
    let real = bbox.to_real_coordinate(&[0.5, 0.25]);
    assert_eq!(real, vec![0.0, 3.0]);
    assert_eq!(bbox.to_unit_coordinate(&real), vec![0.5, 0.25]);
    assert!(bbox.contains(&real));
    assert!(!bbox.contains(&[0.0, 7.0]));
}
