//! XYZ format support
//!
//! Plain-text `x y z [nx ny nz]` lines, whitespace separated. Malformed
//! lines are skipped with a warning.

use crate::{PointCloudReader, PointCloudWriter};
use cumulus_core::{Point3d, PointCloud, Result, Vector3d};
use log::warn;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

pub struct XyzReader;
pub struct XyzWriter;

impl PointCloudReader for XyzReader {
    fn read_point_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut cloud = PointCloud::new();
        let mut normals = Vec::new();
        for (line_number, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let values: Vec<f64> = trimmed
                .split_whitespace()
                .map_while(|token| token.parse().ok())
                .collect();
            if values.len() < 3 {
                warn!("skipping invalid line {} in XYZ file", line_number + 1);
                continue;
            }
            cloud.points.push(Point3d::new(values[0], values[1], values[2]));
            if values.len() >= 6 {
                normals.push(Vector3d::new(values[3], values[4], values[5]));
            }
        }
        // Normals only count when every point carried them.
        if normals.len() == cloud.points.len() {
            cloud.normals = normals;
        }
        Ok(cloud)
    }
}

impl PointCloudWriter for XyzWriter {
    fn write_point_cloud<P: AsRef<Path>>(cloud: &PointCloud, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let with_normals = cloud.has_normals();
        for (i, point) in cloud.points.iter().enumerate() {
            if with_normals {
                let normal = cloud.normals[i];
                writeln!(
                    writer,
                    "{} {} {} {} {} {}",
                    point.x, point.y, point.z, normal.x, normal.y, normal.z
                )?;
            } else {
                writeln!(writer, "{} {} {}", point.x, point.y, point.z)?;
            }
        }
        Ok(())
    }
}
