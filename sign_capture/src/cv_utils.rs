use bytes::Bytes;
use opencv::{
    core::{Mat, Point, Rect, Scalar, Vector, CV_8UC3},
    imgcodecs, imgproc,
    prelude::*,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CvUtilsError {
    #[error("Failed to encode frame: {0}")]
    EncodeFrameFailed(opencv::Error),
    #[error("Encoder produced no data")]
    EmptyEncoding,
    #[error("OpenCV error: {0}")]
    OpenCvError(opencv::Error),
}

impl From<opencv::Error> for CvUtilsError {
    fn from(err: opencv::Error) -> Self {
        CvUtilsError::OpenCvError(err)
    }
}

const BANNER_HEIGHT: i32 = 44;
const TEXT_COLOR: (f64, f64, f64) = (255.0, 255.0, 255.0);

fn bgr(color: (f64, f64, f64)) -> Scalar {
    Scalar::new(color.0, color.1, color.2, 0.0)
}

pub struct ImageConverter;

impl ImageConverter {
    pub fn encode_mat_to_jpg(mat: &Mat) -> Result<Bytes, CvUtilsError> {
        let mut buf = Vector::<u8>::new();
        imgcodecs::imencode(".jpg", mat, &mut buf, &Vector::new())
            .map_err(CvUtilsError::EncodeFrameFailed)?;
        if buf.is_empty() {
            return Err(CvUtilsError::EmptyEncoding);
        }
        Ok(Bytes::from(buf.to_vec()))
    }

    pub fn blank_canvas(width: i32, height: i32) -> Result<Mat, CvUtilsError> {
        let canvas =
            Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(0.0))?;
        Ok(canvas)
    }

    /// Dark strip along the top edge with `text` in it.
    pub fn draw_banner(mat: &mut Mat, text: &str, color: (f64, f64, f64)) -> Result<(), CvUtilsError> {
        let width = mat.cols();
        imgproc::rectangle(
            mat,
            Rect::new(0, 0, width, BANNER_HEIGHT),
            Scalar::new(20.0, 20.0, 20.0, 0.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )?;
        imgproc::put_text(
            mat,
            text,
            Point::new(12, BANNER_HEIGHT - 12),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.9,
            bgr(color),
            2,
            imgproc::LINE_AA,
            false,
        )?;
        Ok(())
    }

    pub fn draw_prediction(mat: &mut Mat, text: &str) -> Result<(), CvUtilsError> {
        Self::draw_banner(mat, text, TEXT_COLOR)
    }

    pub fn draw_error(mat: &mut Mat, text: &str) -> Result<(), CvUtilsError> {
        Self::draw_banner(mat, text, (60.0, 60.0, 230.0))
    }

    pub fn draw_button(mat: &mut Mat, rect: Rect, text: &str) -> Result<(), CvUtilsError> {
        imgproc::rectangle(
            mat,
            rect,
            Scalar::new(70.0, 70.0, 70.0, 0.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )?;
        imgproc::rectangle(mat, rect, bgr(TEXT_COLOR), 1, imgproc::LINE_8, 0)?;

        let mut baseline = 0;
        let size = imgproc::get_text_size(text, imgproc::FONT_HERSHEY_SIMPLEX, 0.6, 1, &mut baseline)?;
        let origin = Point::new(
            rect.x + (rect.width - size.width).max(0) / 2,
            rect.y + (rect.height + size.height) / 2,
        );
        imgproc::put_text(
            mat,
            text,
            origin,
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.6,
            bgr(TEXT_COLOR),
            1,
            imgproc::LINE_AA,
            false,
        )?;
        Ok(())
    }

    /// Toggle button area for a canvas of the given size.
    pub fn button_rect(width: i32, height: i32) -> Rect {
        let button_width = 200.min(width);
        let button_height = 40.min(height);
        Rect::new(
            10.min(width - button_width),
            (height - button_height - 10).max(0),
            button_width,
            button_height,
        )
    }
}

pub fn rect_contains(rect: &Rect, x: i32, y: i32) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}
