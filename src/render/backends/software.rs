use crate::host::HostEnvironment;
use crate::render::broker::{
    BrokerError, MapMode, MappedSurface, PipelineState, RenderTargetRef, ResourceBroker,
    ShaderViewRef, SharedHandle, SharedTextureRef, Topology,
};
use crate::render::frame::{FrameBacking, FrameTarget, PixelFormat, ResourceId, TextureUsage};
use crate::render::geometry::{align_up, Rect, SurfaceSize, BYTES_PER_PIXEL};
use crate::render::Viewport;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Row pitch alignment of mapped textures, in bytes.
const PITCH_ALIGNMENT: u32 = 64;

/// Byte pattern written into write-discard mappings, whose prior contents are undefined.
const DISCARD_FILL: u8 = 0xCD;

const FLIP_VERTEX_SHADER: ResourceId = ResourceId(u64::MAX - 1);
const FLIP_PIXEL_SHADER: ResourceId = ResourceId(u64::MAX - 2);
const FLIP_SAMPLER: ResourceId = ResourceId(u64::MAX - 3);
const FLIP_BLEND: ResourceId = ResourceId(u64::MAX - 4);

/// Counters kept by the [`SoftwareBroker`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SoftwareStats {
    pub creates: usize,
    pub releases: usize,
    pub maps: usize,
    pub unmaps: usize,
    pub blits: usize,
    pub draws: usize,
    pub copies: usize,
    pub live_resources: usize,
    pub live_frame_targets: usize,
    pub live_imports: usize,
    pub live_views: usize,
}

enum ResourceKind {
    FrameTarget { backing: FrameBacking },
    RenderTarget,
    Import { handle: SharedHandle },
    View { texture: ResourceId },
}

struct Resource {
    kind: ResourceKind,
    size: SurfaceSize,
    pitch: usize,
    pixels: Vec<u8>,
}

/// A texture owned by the "browser side", reachable through a shared handle.
struct Export {
    size: SurfaceSize,
    pixels: Vec<u8>,
}

#[derive(Default)]
struct Failures {
    device_not_ready: bool,
    write_map: bool,
    discard_map: bool,
    imports: bool,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    next_handle: u64,
    resources: HashMap<ResourceId, Resource>,
    exports: HashMap<SharedHandle, Export>,
    pipeline: PipelineState,
    stats: SoftwareStats,
    failures: Failures,
}

impl Inner {
    fn allocate(&mut self, kind: ResourceKind, size: SurfaceSize, pitch: usize) -> ResourceId {
        self.next_id += 1;
        let id = ResourceId(self.next_id);
        let pixels = match kind {
            ResourceKind::View { .. } | ResourceKind::Import { .. } => Vec::new(),
            _ => vec![0u8; pitch * size.height as usize],
        };

        self.resources.insert(
            id,
            Resource {
                kind,
                size,
                pitch,
                pixels,
            },
        );
        self.stats.creates += 1;
        id
    }

    fn check_ready(&self, size: SurfaceSize) -> Result<(), BrokerError> {
        if self.failures.device_not_ready {
            return Err(BrokerError::DeviceNotReady);
        }
        if size.is_empty() {
            return Err(BrokerError::ZeroSized);
        }
        Ok(())
    }

    /// Pixels behind a shader view: the exported texture of the import it was created for.
    fn view_source(&self, view: ResourceId) -> Result<&Export, BrokerError> {
        let texture = match self.resources.get(&view) {
            Some(Resource {
                kind: ResourceKind::View { texture },
                ..
            }) => *texture,
            _ => return Err(BrokerError::UnknownResource(view)),
        };
        self.import_source(texture)
    }

    fn import_source(&self, import: ResourceId) -> Result<&Export, BrokerError> {
        let handle = match self.resources.get(&import) {
            Some(Resource {
                kind: ResourceKind::Import { handle },
                ..
            }) => *handle,
            _ => return Err(BrokerError::UnknownResource(import)),
        };
        self.exports
            .get(&handle)
            .ok_or(BrokerError::InvalidSharedHandle(handle))
    }

    fn recount(&mut self) {
        let mut stats = self.stats;
        stats.live_resources = self.resources.len();
        stats.live_frame_targets = 0;
        stats.live_imports = 0;
        stats.live_views = 0;
        for res in self.resources.values() {
            match res.kind {
                ResourceKind::FrameTarget { .. } => stats.live_frame_targets += 1,
                ResourceKind::Import { .. } => stats.live_imports += 1,
                ResourceKind::View { .. } => stats.live_views += 1,
                ResourceKind::RenderTarget => {}
            }
        }
        self.stats = stats;
    }
}

/// Copies `size` worth of rows between two pitched buffers, optionally flipping.
fn copy_rows(
    dst: &mut [u8],
    dst_pitch: usize,
    src: &[u8],
    src_pitch: usize,
    size: SurfaceSize,
    flip: bool,
) {
    let row_len = size.row_bytes().min(dst_pitch).min(src_pitch);
    let height = size.height as usize;
    for y in 0..height {
        let dy = if flip { height - y - 1 } else { y };
        let s = y * src_pitch;
        let d = dy * dst_pitch;
        if s + row_len > src.len() || d + row_len > dst.len() {
            break;
        }
        dst[d..d + row_len].copy_from_slice(&src[s..s + row_len]);
    }
}

/// In-memory device.
///
/// Textures are plain byte vectors. Shared handles are produced with
/// [`SoftwareBroker::export_shared`], which plays the role of the browser's
/// GPU process. Failures can be injected to exercise the compositor's retry
/// paths, and every texture can be read back.
pub struct SoftwareBroker {
    inner: Mutex<Inner>,
}

impl Default for SoftwareBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareBroker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publishes a texture on the "browser side" and returns its shared handle.
    /// `pixels` are tightly packed BGRA rows.
    pub fn export_shared(&self, size: SurfaceSize, pixels: Vec<u8>) -> SharedHandle {
        let mut inner = self.lock();
        inner.next_handle += 1;
        let handle = SharedHandle(0x1000 + inner.next_handle);
        inner.exports.insert(handle, Export { size, pixels });
        handle
    }

    /// Exports a texture filled with a single 32-bit pixel value.
    pub fn export_solid(&self, size: SurfaceSize, pixel: u32) -> SharedHandle {
        let pixels = pixel.to_le_bytes().repeat(size.width as usize * size.height as usize);
        self.export_shared(size, pixels)
    }

    /// Drops an exported texture, invalidating its handle.
    pub fn revoke_shared(&self, handle: SharedHandle) {
        self.lock().exports.remove(&handle);
    }

    pub fn stats(&self) -> SoftwareStats {
        let mut inner = self.lock();
        inner.recount();
        inner.stats
    }

    /// Ids of every live resource.
    pub fn live_ids(&self) -> Vec<ResourceId> {
        let mut ids: Vec<ResourceId> = self.lock().resources.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn is_live(&self, id: ResourceId) -> bool {
        self.lock().resources.contains_key(&id)
    }

    /// Tightly packed copy of a frame target or render target.
    pub fn read_pixels(&self, id: ResourceId) -> Option<Vec<u8>> {
        let inner = self.lock();
        let res = inner.resources.get(&id)?;
        if res.pixels.is_empty() {
            return None;
        }

        let mut out = vec![0u8; res.size.byte_len()];
        copy_rows(
            &mut out,
            res.size.row_bytes(),
            &res.pixels,
            res.pitch,
            res.size,
            false,
        );
        Some(out)
    }

    /// Every pixel of a texture as 32-bit little-endian values.
    pub fn read_pixels_u32(&self, id: ResourceId) -> Option<Vec<u32>> {
        let bytes = self.read_pixels(id)?;
        Some(
            bytes
                .chunks_exact(BYTES_PER_PIXEL)
                .map(|px| u32::from_le_bytes([px[0], px[1], px[2], px[3]]))
                .collect(),
        )
    }

    /// Makes every creation call fail with [`BrokerError::DeviceNotReady`].
    pub fn set_device_ready(&self, ready: bool) {
        self.lock().failures.device_not_ready = !ready;
    }

    pub fn fail_write_maps(&self, fail: bool) {
        self.lock().failures.write_map = fail;
    }

    pub fn fail_discard_maps(&self, fail: bool) {
        self.lock().failures.discard_map = fail;
    }

    pub fn fail_imports(&self, fail: bool) {
        self.lock().failures.imports = fail;
    }
}

impl ResourceBroker for SoftwareBroker {
    fn name(&self) -> &str {
        "SoftwareBroker"
    }

    fn create_frame_target(
        &self,
        size: SurfaceSize,
        format: PixelFormat,
        usage: TextureUsage,
        generation: u64,
    ) -> Result<FrameTarget, BrokerError> {
        let mut inner = self.lock();
        inner.check_ready(size)?;

        let backing = if usage.contains(TextureUsage::CPU_WRITE) {
            FrameBacking::CpuMappable
        } else {
            FrameBacking::Gpu
        };
        let pitch = align_up(size.width * BYTES_PER_PIXEL as u32, PITCH_ALIGNMENT) as usize;
        let id = inner.allocate(ResourceKind::FrameTarget { backing }, size, pitch);

        Ok(FrameTarget::new(id, size, format, backing).with_generation(generation))
    }

    fn create_render_target(&self, size: SurfaceSize) -> Result<RenderTargetRef, BrokerError> {
        let mut inner = self.lock();
        inner.check_ready(size)?;

        let id = inner.allocate(ResourceKind::RenderTarget, size, size.row_bytes());
        Ok(RenderTargetRef { id, size })
    }

    fn import_shared_handle(
        &self,
        handle: SharedHandle,
        size: SurfaceSize,
    ) -> Result<SharedTextureRef, BrokerError> {
        let mut inner = self.lock();
        inner.check_ready(size)?;
        if inner.failures.imports || !inner.exports.contains_key(&handle) {
            return Err(BrokerError::InvalidSharedHandle(handle));
        }

        let id = inner.allocate(ResourceKind::Import { handle }, size, 0);
        Ok(SharedTextureRef { id, handle, size })
    }

    fn create_shader_view(&self, texture: &SharedTextureRef) -> Result<ShaderViewRef, BrokerError> {
        let mut inner = self.lock();
        inner.check_ready(texture.size)?;
        if !inner.resources.contains_key(&texture.id) {
            return Err(BrokerError::UnknownResource(texture.id));
        }

        let id = inner.allocate(
            ResourceKind::View {
                texture: texture.id,
            },
            texture.size,
            0,
        );
        Ok(ShaderViewRef {
            id,
            texture: texture.id,
        })
    }

    fn release(&self, id: ResourceId) {
        let mut inner = self.lock();
        if inner.resources.remove(&id).is_some() {
            inner.stats.releases += 1;
        }
    }

    fn map<'a>(
        &'a self,
        target: &FrameTarget,
        mode: MapMode,
    ) -> Result<Box<dyn MappedSurface + 'a>, BrokerError> {
        let mut inner = self.lock();
        let failing = match mode {
            MapMode::Write => inner.failures.write_map,
            MapMode::WriteDiscard => inner.failures.discard_map,
        };
        if failing || inner.failures.device_not_ready {
            return Err(BrokerError::MapFailed(mode));
        }

        let res = inner
            .resources
            .get(&target.id())
            .ok_or(BrokerError::UnknownResource(target.id()))?;
        match res.kind {
            ResourceKind::FrameTarget {
                backing: FrameBacking::CpuMappable,
            } => {}
            _ => return Err(BrokerError::MapFailed(mode)),
        }

        let bytes = match mode {
            MapMode::Write => res.pixels.clone(),
            MapMode::WriteDiscard => vec![DISCARD_FILL; res.pixels.len()],
        };
        let pitch = res.pitch;
        inner.stats.maps += 1;

        Ok(Box::new(SoftwareMapping {
            broker: self,
            id: target.id(),
            pitch,
            bytes,
        }))
    }

    fn blit(&self, dst: &FrameTarget, src: &SharedTextureRef) -> Result<(), BrokerError> {
        let mut inner = self.lock();
        let source = inner.import_source(src.id)?;
        let size = SurfaceSize::new(
            source.size.width.min(dst.width()),
            source.size.height.min(dst.height()),
        );
        let pixels = source.pixels.clone();
        let src_pitch = source.size.row_bytes();

        let target = inner
            .resources
            .get_mut(&dst.id())
            .ok_or(BrokerError::UnknownResource(dst.id()))?;
        let pitch = target.pitch;
        copy_rows(&mut target.pixels, pitch, &pixels, src_pitch, size, false);

        inner.stats.blits += 1;
        Ok(())
    }

    fn bind_flip_pass(
        &self,
        target: &RenderTargetRef,
        view: &ShaderViewRef,
        size: SurfaceSize,
    ) -> Result<(), BrokerError> {
        let mut inner = self.lock();
        for id in [target.id, view.id] {
            if !inner.resources.contains_key(&id) {
                return Err(BrokerError::UnknownResource(id));
            }
        }

        inner.pipeline = PipelineState {
            render_target: Some(target.id),
            depth_stencil: None,
            blend_state: Some(FLIP_BLEND),
            sampler: Some(FLIP_SAMPLER),
            pixel_shader: Some(FLIP_PIXEL_SHADER),
            vertex_shader: Some(FLIP_VERTEX_SHADER),
            shader_resource: Some(view.id),
            input_layout: None,
            topology: Topology::TriangleStrip,
            viewport: Viewport::covering(size),
            scissor: Rect::full(size),
        };
        Ok(())
    }

    fn draw(&self, vertex_count: u32) -> Result<(), BrokerError> {
        let mut inner = self.lock();
        let pipeline = inner.pipeline.clone();
        let (Some(rt), Some(view)) = (pipeline.render_target, pipeline.shader_resource) else {
            return Err(BrokerError::DeviceLost);
        };

        // only the flip shaders are emulated; anything else draws nothing
        if pipeline.pixel_shader == Some(FLIP_PIXEL_SHADER) && vertex_count >= 3 {
            let source = inner.view_source(view)?;
            let pixels = source.pixels.clone();
            let src_size = source.size;

            let target = inner
                .resources
                .get_mut(&rt)
                .ok_or(BrokerError::UnknownResource(rt))?;
            let size = SurfaceSize::new(
                src_size.width.min(target.size.width),
                src_size.height.min(target.size.height),
            );
            let pitch = target.pitch;
            copy_rows(&mut target.pixels, pitch, &pixels, src_size.row_bytes(), size, true);
        }

        inner.stats.draws += 1;
        Ok(())
    }

    fn copy_resource(&self, dst: &FrameTarget, src: &RenderTargetRef) -> Result<(), BrokerError> {
        let mut inner = self.lock();
        let (pixels, src_pitch, src_size) = match inner.resources.get(&src.id) {
            Some(res) => (res.pixels.clone(), res.pitch, res.size),
            None => return Err(BrokerError::UnknownResource(src.id)),
        };

        let target = inner
            .resources
            .get_mut(&dst.id())
            .ok_or(BrokerError::UnknownResource(dst.id()))?;
        let size = SurfaceSize::new(
            src_size.width.min(target.size.width),
            src_size.height.min(target.size.height),
        );
        let pitch = target.pitch;
        copy_rows(&mut target.pixels, pitch, &pixels, src_pitch, size, false);

        inner.stats.copies += 1;
        Ok(())
    }

    fn capture_pipeline_state(&self) -> PipelineState {
        self.lock().pipeline.clone()
    }

    fn apply_pipeline_state(&self, state: &PipelineState) {
        self.lock().pipeline = state.clone();
    }
}

/// Write mapping of a software texture. Contents are written back on drop.
struct SoftwareMapping<'a> {
    broker: &'a SoftwareBroker,
    id: ResourceId,
    pitch: usize,
    bytes: Vec<u8>,
}

impl MappedSurface for SoftwareMapping<'_> {
    fn pitch(&self) -> usize {
        self.pitch
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Drop for SoftwareMapping<'_> {
    fn drop(&mut self) {
        let mut inner = self.broker.lock();
        if let Some(res) = inner.resources.get_mut(&self.id) {
            res.pixels = std::mem::take(&mut self.bytes);
        }
        inner.stats.unmaps += 1;
    }
}

/// Host environment whose answers are set by hand.
pub struct SoftwareHost {
    ready: AtomicBool,
    muted: AtomicBool,
    resolution: Mutex<SurfaceSize>,
}

impl SoftwareHost {
    pub fn new(resolution: SurfaceSize) -> Self {
        Self {
            ready: AtomicBool::new(true),
            muted: AtomicBool::new(false),
            resolution: Mutex::new(resolution),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    pub fn set_resolution(&self, size: SurfaceSize) {
        *self
            .resolution
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = size;
    }
}

impl HostEnvironment for SoftwareHost {
    fn renderer_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn output_resolution(&self) -> SurfaceSize {
        *self
            .resolution
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn should_mute(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }
}
