pub mod shapegeneration;
