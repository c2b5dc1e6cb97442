use geo::MultiPolygon;

#[derive(Debug, Clone)]
pub struct Region {
    pub id: String,
    pub geometry: MultiPolygon<f64>,
    // 0 when the value table has no row for `id`
    pub value: f64,
}
