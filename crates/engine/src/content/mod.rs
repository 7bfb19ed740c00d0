mod maps;

pub use maps::{
    load_map_set, parse_map_set, MapDefinition, MapInfo, MapLoadError, MapSet, MapSetFile,
    TileLayout,
};
