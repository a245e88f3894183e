use criterion::{Criterion, black_box, criterion_group, criterion_main};

use glam::{IVec3, UVec3};

use voxmesh::mesh::config::MesherConfig;
use voxmesh::mesh::mesher::mesh_volume;
use voxmesh::mesh::volume::VoxelVolume;
use voxmesh::vox::chunk::{Body, Chunk, RawBody, SizeBody, VoxelPoint, VoxelsBody};
use voxmesh::vox::material::MaterialTable;
use voxmesh::vox::palette::DEFAULT_PALETTE;
use voxmesh::vox::VoxAsset;

/// Sphere-shaped point cloud, two alternating ids to defeat trivial merges.
fn sphere_points(size: u32, radius: f32) -> Vec<[u32; 4]> {
    let center = size as f32 / 2.0;
    let mut points = Vec::new();
    for z in 0..size {
        for y in 0..size {
            for x in 0..size {
                let d = glam::Vec3::new(
                    x as f32 - center,
                    y as f32 - center,
                    z as f32 - center,
                );
                if d.length() <= radius {
                    points.push([x, y, z, 1 + (x + y + z) % 2]);
                }
            }
        }
    }
    points
}

fn solid_volume(size: u32) -> VoxelVolume {
    let mut points = Vec::new();
    for z in 0..size {
        for y in 0..size {
            for x in 0..size {
                points.push([x, y, z, 1]);
            }
        }
    }
    VoxelVolume::from_points(UVec3::splat(size), points).unwrap()
}

fn bench_mesh_solid_32(c: &mut Criterion) {
    let volume = solid_volume(32);
    let materials = MaterialTable::new();
    let config = MesherConfig::default();

    c.bench_function("mesh_solid_32", |b| {
        b.iter(|| {
            mesh_volume(
                black_box(&volume),
                &DEFAULT_PALETTE,
                &materials,
                &config,
            )
        });
    });
}

fn bench_mesh_sphere_64(c: &mut Criterion) {
    let volume = VoxelVolume::from_points(UVec3::splat(64), sphere_points(64, 28.0)).unwrap();
    let materials = MaterialTable::new();
    let config = MesherConfig::default();

    c.bench_function("mesh_sphere_64", |b| {
        b.iter(|| {
            mesh_volume(
                black_box(&volume),
                &DEFAULT_PALETTE,
                &materials,
                &config,
            )
        });
    });
}

fn bench_mesh_sphere_64_combined(c: &mut Criterion) {
    let volume = VoxelVolume::from_points(UVec3::splat(64), sphere_points(64, 28.0)).unwrap();
    let materials = MaterialTable::new();
    let config = MesherConfig::with_combined();

    c.bench_function("mesh_sphere_64_combined", |b| {
        b.iter(|| {
            mesh_volume(
                black_box(&volume),
                &DEFAULT_PALETTE,
                &materials,
                &config,
            )
        });
    });
}

fn sample_asset_bytes() -> Vec<u8> {
    let points = sphere_points(32, 14.0)
        .into_iter()
        .map(|[x, y, z, i]| VoxelPoint::new(x as u8, y as u8, z as u8, i as u8))
        .collect();
    let root = Chunk::with_children(
        Body::Main(RawBody::default()),
        vec![
            Chunk::new(Body::Size(SizeBody {
                extent: IVec3::splat(32),
            })),
            Chunk::new(Body::Voxels(VoxelsBody { points })),
        ],
    );
    VoxAsset::new(root).encode().unwrap()
}

fn bench_decode_asset(c: &mut Criterion) {
    let bytes = sample_asset_bytes();

    c.bench_function("decode_asset_sphere_32", |b| {
        b.iter(|| VoxAsset::decode(black_box(&bytes)).unwrap());
    });
}

fn bench_encode_asset(c: &mut Criterion) {
    let asset = VoxAsset::decode(&sample_asset_bytes()).unwrap();

    c.bench_function("encode_asset_sphere_32", |b| {
        b.iter(|| black_box(&asset).encode().unwrap());
    });
}

criterion_group!(
    benches,
    bench_mesh_solid_32,
    bench_mesh_sphere_64,
    bench_mesh_sphere_64_combined,
    bench_decode_asset,
    bench_encode_asset,
);
criterion_main!(benches);
