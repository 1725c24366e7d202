use nalgebra::Point2;

/// Generate a grid of sample points evenly distributed across an image,
/// expressed in centered coordinates (origin at the image midpoint)
///
/// # Arguments
///
/// * `width` - The width of the image in pixels
/// * `height` - The height of the image in pixels
/// * `nx` - The number of grid cells along x
/// * `ny` - The number of grid cells along y
///
/// # Returns
///
/// A vector of 2D points, one at the center of each grid cell, in row-major
/// cell order
pub fn grid_points(width: f64, height: f64, nx: usize, ny: usize) -> Vec<Point2<f64>> {
    let mut points = Vec::with_capacity(nx * ny);

    // Calculate the dimensions of each cell
    let cell_width = width / nx as f64;
    let cell_height = height / ny as f64;

    // Generate a point at the center of each cell, shifted to the centered frame
    for i in 0..ny {
        for j in 0..nx {
            let x = (j as f64 + 0.5) * cell_width - width / 2.0;
            let y = (i as f64 + 0.5) * cell_height - height / 2.0;
            points.push(Point2::new(x, y));
        }
    }

    points
}
