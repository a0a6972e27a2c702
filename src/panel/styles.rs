pub const STYLE_ELEMENT_ID: &str = "linkpeek-styles";
pub const CONTAINER_ID: &str = "linkpeek-container";
pub const PANEL_ID: &str = "linkpeek-preview-panel";
pub const TRANSITION_CLASS: &str = "linkpeek-transitioning";

pub const PANEL_CSS: &str = r#"
#linkpeek-container {
  position: fixed;
  top: 0;
  right: 0;
  width: 280px;
  height: 100vh;
  z-index: 2147483647;
  overflow-x: hidden;
  overflow-y: auto;
  box-shadow: -2px 0 10px rgba(0, 0, 0, 0.1);
}

#linkpeek-preview-panel {
  display: flex;
  flex-direction: column;
  box-sizing: border-box;
  width: 100%;
  height: 100%;
  padding: 12px;
}

.linkpeek-cards {
  display: flex;
  flex-direction: column;
  gap: 8px;
}

.linkpeek-card {
  position: relative;
  display: flex;
  align-items: center;
  gap: 10px;
  min-height: 50px;
  padding: 10px;
  border: 1px solid rgba(0, 0, 0, 0.1);
  border-radius: 8px;
  background-size: cover;
  background-position: top center;
  cursor: pointer;
  transition: transform 0.2s ease, box-shadow 0.2s ease;
}

.linkpeek-card:hover {
  box-shadow: 0 2px 8px rgba(0, 0, 0, 0.15);
  transform: translateX(-2px);
}

.linkpeek-card-active {
  opacity: 0.3;
  pointer-events: none;
}

.linkpeek-favicon {
  flex-shrink: 0;
  width: 20px;
  height: 20px;
  object-fit: contain;
}

.linkpeek-title {
  flex: 1;
  overflow: hidden;
  color: #fff;
  font-size: 13px;
  line-height: 1.3;
  text-overflow: ellipsis;
  text-shadow: 0 1px 2px rgba(0, 0, 0, 0.6);
}

.linkpeek-visit-badge {
  position: absolute;
  top: 6px;
  right: 6px;
  min-width: 18px;
  padding: 2px 6px;
  border-radius: 10px;
  background: rgba(59, 130, 246, 0.9);
  color: #fff;
  font-size: 10px;
  font-weight: 600;
  text-align: center;
}

.linkpeek-blacklist-btn {
  position: absolute;
  right: 6px;
  bottom: 6px;
  width: 20px;
  height: 20px;
  padding: 0;
  border: none;
  border-radius: 50%;
  background: rgba(239, 68, 68, 0.9);
  color: #fff;
  opacity: 0;
  cursor: pointer;
}

.linkpeek-card:hover .linkpeek-blacklist-btn {
  opacity: 1;
}

.linkpeek-previews {
  position: relative;
  flex: 1;
  margin-top: 12px;
}

.linkpeek-preview {
  position: absolute;
  inset: 0;
  overflow: hidden;
  border-radius: 8px;
  background: #fff;
  box-shadow: 0 2px 12px rgba(0, 0, 0, 0.15);
}

.linkpeek-preview iframe {
  display: block;
  width: 100%;
  height: 100%;
  border: none;
}

.linkpeek-preview-fallback {
  display: flex;
  flex-direction: column;
  align-items: center;
  justify-content: center;
  gap: 12px;
  height: 100%;
  padding: 20px;
  text-align: center;
  color: #666;
}

.linkpeek-open-btn {
  padding: 8px 16px;
  border: none;
  border-radius: 6px;
  background: #3b82f6;
  color: #fff;
  cursor: pointer;
}

@keyframes linkpeek-transition-out {
  from {
    transform: scale(1) translateX(0);
    opacity: 1;
  }
  to {
    transform: scale(1.5) translateX(-50%);
    opacity: 0;
  }
}

.linkpeek-transitioning {
  animation: linkpeek-transition-out 0.4s ease-out forwards;
}
"#;
