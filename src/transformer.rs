//! Spatial transformer sampling.
//!
//! A batch of affine transforms is turned into a sampling grid over each input
//! image, and the output pixels are read from it with bilinear interpolation.
//! Coordinates are normalized to `[-1, 1]` on both axes.

use burn::prelude::*;

/// `n` evenly spaced values from -1 to 1, inclusive.
fn linspace(n: usize) -> Vec<f32> {
    match n {
        0 => vec![],
        1 => vec![-1.0],
        _ => (0..n)
            .map(|i| -1.0 + 2.0 * i as f32 / (n - 1) as f32)
            .collect(),
    }
}

/// Homogeneous target coordinates for an output of `height x width` pixels.
///
/// # Shape
/// `[3, height * width]`, rows being `x_t`, `y_t` and ones, in row-major pixel order.
pub fn meshgrid<B: Backend>(height: usize, width: usize, device: &B::Device) -> Tensor<B, 2> {
    let xs = linspace(width);
    let ys = linspace(height);
    let n = height * width;
    let mut grid = Vec::with_capacity(3 * n);
    for _ in 0..height {
        grid.extend_from_slice(&xs);
    }
    for y in &ys {
        grid.extend(std::iter::repeat_n(*y, width));
    }
    grid.extend(std::iter::repeat_n(1f32, n));
    let data = TensorData::new(grid, [3, n]).convert::<B::FloatElem>();
    Tensor::from_data(data, device)
}

/// Warps `images` by the affine transforms `theta`.
///
/// Each row of `theta` holds a row-major 2x3 matrix that maps target
/// coordinates to source coordinates.
///
/// # Shapes
/// - images: `[batch, channels, height, width]`
/// - theta: `[batch, 6]`
/// - output: `[batch, channels, out_height, out_width]`
pub fn affine_transform<B: Backend>(
    images: Tensor<B, 4>,
    theta: Tensor<B, 2>,
    out_size: [usize; 2],
) -> Tensor<B, 4> {
    let [batch, channels, _height, _width] = images.dims();
    let [out_height, out_width] = out_size;
    let n = out_height * out_width;
    let device = images.device();

    let theta = theta.reshape([batch, 2, 3]);
    let grid = meshgrid::<B>(out_height, out_width, &device)
        .unsqueeze::<3>()
        .repeat_dim(0, batch);
    let source = theta.matmul(grid);
    assert_eq!([batch, 2, n], source.dims());

    let x_s = source.clone().narrow(1, 0, 1).reshape([batch, n]);
    let y_s = source.narrow(1, 1, 1).reshape([batch, n]);

    interpolate(images, x_s, y_s).reshape([batch, channels, out_height, out_width])
}

/// Bilinear sampling of `images` at normalized coordinates.
///
/// # Shapes
/// - images: `[batch, channels, height, width]`
/// - x, y: `[batch, n]`
/// - output: `[batch, channels, n]`
pub fn interpolate<B: Backend>(
    images: Tensor<B, 4>,
    x: Tensor<B, 2>,
    y: Tensor<B, 2>,
) -> Tensor<B, 3> {
    let [batch, channels, height, width] = images.dims();
    let [_batch, n] = x.dims();
    let max_x = (width - 1) as f64;
    let max_y = (height - 1) as f64;

    // [-1, 1] -> [0, size]
    let x = (x + 1.0) * (width as f64) / 2.0;
    let y = (y + 1.0) * (height as f64) / 2.0;

    let x0 = x.clone().floor();
    let x1 = (x0.clone() + 1.0).clamp(0.0, max_x);
    let x0 = x0.clamp(0.0, max_x);
    let y0 = y.clone().floor();
    let y1 = (y0.clone() + 1.0).clamp(0.0, max_y);
    let y0 = y0.clamp(0.0, max_y);

    let flat = images.reshape([batch, channels, height * width]);
    // indices are combined as integers, exact for any image size
    let pixels = |ys: &Tensor<B, 2>, xs: &Tensor<B, 2>| {
        let index = (ys.clone().int() * (width as i64) + xs.clone().int())
            .unsqueeze_dim::<3>(1)
            .repeat_dim(1, channels);
        flat.clone().gather(2, index)
    };
    let weight = |w: Tensor<B, 2>| w.unsqueeze_dim::<3>(1).repeat_dim(1, channels);

    let wa = weight((x1.clone() - x.clone()) * (y1.clone() - y.clone()));
    let wb = weight((x1.clone() - x.clone()) * (y.clone() - y0.clone()));
    let wc = weight((x.clone() - x0.clone()) * (y1.clone() - y.clone()));
    let wd = weight((x - x0.clone()) * (y - y0.clone()));

    let out = wa * pixels(&y0, &x0)
        + wb * pixels(&y1, &x0)
        + wc * pixels(&y0, &x1)
        + wd * pixels(&y1, &x1);
    assert_eq!([batch, channels, n], out.dims());
    out
}
