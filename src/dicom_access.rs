use dicom::core::Tag;
use dicom::object::DefaultDicomObject;

/// Small helper trait to pull typed values out of a DICOM object without caring about VR quirks.
pub trait ElementAccess {
    fn element_str(&self, tag: Tag) -> Option<String>;
    fn element_int(&self, tag: Tag) -> Option<i32>;
    fn element_f64(&self, tag: Tag) -> Option<f64>;
}

impl ElementAccess for DefaultDicomObject {
    fn element_str(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn element_int(&self, tag: Tag) -> Option<i32> {
        self.element(tag).ok().and_then(|e| e.to_int::<i32>().ok())
    }

    fn element_f64(&self, tag: Tag) -> Option<f64> {
        // Multi-valued DS (e.g. several windows) resolves to its first value.
        self.element(tag)
            .ok()
            .and_then(|e| e.to_multi_float64().ok())
            .and_then(|values| values.first().copied())
            .filter(|v| v.is_finite())
    }
}
