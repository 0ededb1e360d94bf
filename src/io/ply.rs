use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use super::{Geometry, LoadError};
use ndarray::{Array2, Axis};
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
    ScalarType,
};
use ply_rs::writer::Writer;
use ply_rs::{parser, ply};

/// We know what data we want to read, hence we load the vertices straight into structs.
#[derive(Debug)]
struct Vertex {
    point: [f32; 3],
    color: [u8; 3],
    label: f32,
}

impl ply::PropertyAccess for Vertex {
    fn new() -> Self {
        Vertex {
            point: [0f32; 3],
            color: [0u8; 3],
            label: 0.0,
        }
    }
    fn set_property(&mut self, key: String, property: ply::Property) {
        match (key.as_ref(), property) {
            ("x", ply::Property::Float(v)) => self.point[0] = v,
            ("y", ply::Property::Float(v)) => self.point[1] = v,
            ("z", ply::Property::Float(v)) => self.point[2] = v,
            ("x", ply::Property::Double(v)) => self.point[0] = v as f32,
            ("y", ply::Property::Double(v)) => self.point[1] = v as f32,
            ("z", ply::Property::Double(v)) => self.point[2] = v as f32,
            ("red", ply::Property::UChar(v)) => self.color[0] = v,
            ("green", ply::Property::UChar(v)) => self.color[1] = v,
            ("blue", ply::Property::UChar(v)) => self.color[2] = v,
            ("label", ply::Property::Float(v)) => self.label = v,
            ("label", ply::Property::Int(v)) => self.label = v as f32,
            ("label", ply::Property::UInt(v)) => self.label = v as f32,
            ("label", ply::Property::UChar(v)) => self.label = v as f32,
            (_, _) => (),
        }
    }
}

/// Reads the vertex element of a PLY file as a point cloud. Colors are read when the
/// file has `red`, `green` and `blue`; a per-vertex `label` property becomes a single
/// auxiliary column. Other elements, such as faces, are ignored.
pub fn read_ply<P>(filepath: P) -> Result<Geometry, LoadError>
where
    P: AsRef<Path>,
{
    let fptr = File::open(filepath.as_ref())?;
    let mut f = std::io::BufReader::new(fptr);

    let vertex_parser = parser::Parser::<Vertex>::new();
    let header = vertex_parser.read_header(&mut f)?;

    let element = header.elements.get("vertex").ok_or_else(|| {
        LoadError::ParseError(format!(
            "{}: no vertex element",
            filepath.as_ref().display()
        ))
    })?;
    if !["x", "y", "z"]
        .iter()
        .all(|k| element.properties.contains_key(*k))
    {
        return Err(LoadError::ParseError(format!(
            "{}: vertex element lacks x, y or z",
            filepath.as_ref().display()
        )));
    }

    // Elements are stored in order, anything before the vertices must be skipped by
    // reading it with the default element parser.
    let mut vertex_vec = Vec::new();
    for (name, element) in &header.elements {
        if name == "vertex" {
            vertex_vec = vertex_parser.read_payload_for_element(&mut f, element, &header)?;
            break;
        }
        parser::Parser::<DefaultElement>::new().read_payload_for_element(
            &mut f,
            element,
            &header,
        )?;
    }

    let points = Array2::<f32>::from_shape_fn((vertex_vec.len(), 3), |(i, c)| {
        vertex_vec[i].point[c]
    });

    let colors = if ["red", "green", "blue"]
        .iter()
        .all(|k| element.properties.contains_key(*k))
    {
        Some(Array2::<u8>::from_shape_fn((vertex_vec.len(), 3), |(i, c)| {
            vertex_vec[i].color[c]
        }))
    } else {
        None
    };

    let extra = if element.properties.contains_key("label") {
        Some(Array2::<f32>::from_shape_fn((vertex_vec.len(), 1), |(i, _)| {
            vertex_vec[i].label
        }))
    } else {
        None
    };

    Ok(Geometry {
        points,
        colors,
        extra,
    })
}

/// Writes the points, and colors when present, as an ASCII PLY file.
pub fn write_ply<P>(filepath: P, geom: &Geometry) -> Result<(), LoadError>
where
    P: AsRef<Path>,
{
    let mut ply = {
        let mut ply = Ply::<DefaultElement>::new();
        let mut vertex_element = ElementDef::new("vertex".to_string());
        ["x", "y", "z"].iter().for_each(|key| {
            vertex_element.properties.add(PropertyDef::new(
                key.to_string(),
                PropertyType::Scalar(ScalarType::Float),
            ));
        });

        let mut vertex_array: Vec<DefaultElement> = geom
            .points
            .axis_iter(Axis(0))
            .map(|point| {
                let mut elem = DefaultElement::new();
                elem.insert("x".to_string(), Property::Float(point[0]));
                elem.insert("y".to_string(), Property::Float(point[1]));
                elem.insert("z".to_string(), Property::Float(point[2]));
                elem
            })
            .collect();

        if let Some(colors) = &geom.colors {
            ["red", "green", "blue"].iter().for_each(|key| {
                vertex_element.properties.add(PropertyDef::new(
                    key.to_string(),
                    PropertyType::Scalar(ScalarType::UChar),
                ));
            });

            colors
                .axis_iter(Axis(0))
                .enumerate()
                .for_each(|(i, color)| {
                    vertex_array[i].insert("red".to_string(), Property::UChar(color[0]));
                    vertex_array[i].insert("green".to_string(), Property::UChar(color[1]));
                    vertex_array[i].insert("blue".to_string(), Property::UChar(color[2]));
                });
        }

        ply.header.elements.add(vertex_element);
        ply.payload.insert("vertex".to_string(), vertex_array);

        ply.make_consistent()
            .map_err(|err| LoadError::ParseError(format!("{err:?}")))?;
        ply
    };

    ply.header.encoding = Encoding::Ascii;

    let mut buf = BufWriter::new(File::create(filepath)?);
    Writer::new().write_ply(&mut buf, &mut ply)?;

    Ok(())
}
